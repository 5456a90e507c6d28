//! Host settings: TOML file plus environment overrides.

use std::path::Path;

use serde::Deserialize;
use tracing::Level;

use crate::binder::{BindOptions, DEFAULT_MIDI_BUFFER_BYTES, DEFAULT_MIDI_BUFFER_EVENTS};

pub const CONFIG_ENV: &str = "LV2HOST_CONFIG";
pub const CLIENT_NAME_ENV: &str = "LV2HOST_CLIENT_NAME";
pub const START_SERVER_ENV: &str = "LV2HOST_START_SERVER";
pub const LOG_ENV: &str = "LV2HOST_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// JACK client name. Defaults to the plugin's name.
    pub client_name: Option<String>,
    /// Let JACK start a server when none is running.
    pub start_server: bool,
    /// Byte capacity of each MIDI port buffer.
    pub midi_buffer_bytes: usize,
    /// Event ceiling of each MIDI port buffer.
    pub midi_buffer_events: usize,
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            client_name: None,
            start_server: false,
            midi_buffer_bytes: DEFAULT_MIDI_BUFFER_BYTES,
            midi_buffer_events: DEFAULT_MIDI_BUFFER_EVENTS,
            log_level: "info".to_string(),
        }
    }
}

impl HostConfig {
    /// Reads the file named by `LV2HOST_CONFIG` if set, then applies the
    /// process environment.
    pub fn load() -> Result<Self, String> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        Self::from_toml_str(&text).map_err(|e| format!("{}: {e}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Invalid config: {e}"))
    }

    /// Overrides fields from environment variables looked up with `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(CLIENT_NAME_ENV) {
            let name = name.trim();
            if !name.is_empty() {
                self.client_name = Some(name.to_string());
            }
        }
        if let Some(value) = lookup(START_SERVER_ENV) {
            self.start_server = parse_flag(&value);
        }
        if let Some(level) = lookup(LOG_ENV) {
            self.log_level = level.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.midi_buffer_bytes == 0 {
            return Err("midi_buffer_bytes must be greater than zero".to_string());
        }
        if self.midi_buffer_events == 0 {
            return Err("midi_buffer_events must be greater than zero".to_string());
        }
        if u32::try_from(self.midi_buffer_bytes).is_err() {
            return Err(format!(
                "midi_buffer_bytes must fit in 32 bits, got {}",
                self.midi_buffer_bytes
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, String> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| format!("Unknown log level {:?}", self.log_level))
    }

    pub fn bind_options(&self) -> BindOptions {
        BindOptions {
            midi_buffer_bytes: self.midi_buffer_bytes,
            midi_buffer_events: self.midi_buffer_events,
        }
    }

    /// Configured client name, else `plugin_name`.
    pub fn client_name_or<'a>(&'a self, plugin_name: &'a str) -> &'a str {
        self.client_name.as_deref().unwrap_or(plugin_name)
    }
}

pub fn parse_flag(value: &str) -> bool {
    let s = value.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

use std::{
    collections::HashMap,
    ffi::{CStr, CString, c_char, c_void},
    fmt,
    ptr::NonNull,
    sync::Mutex,
};

use lilv::{
    World,
    instance::{ActiveInstance, Instance},
    plugin::Plugin,
};
use lv2_raw::{LV2Feature, LV2Urid, LV2UridMap, LV2UridMapHandle, LV2_URID__MAP};
use tracing::debug;

use crate::midi::EventBuffer;
use crate::plugins::{DataType, PluginInstance, PluginPorts, PortClass, PortConnector};

const LV2_INPUT_PORT: &str = "http://lv2plug.in/ns/lv2core#InputPort";
const LV2_OUTPUT_PORT: &str = "http://lv2plug.in/ns/lv2core#OutputPort";
const LV2_CONTROL_PORT: &str = "http://lv2plug.in/ns/lv2core#ControlPort";
const LV2_AUDIO_PORT: &str = "http://lv2plug.in/ns/lv2core#AudioPort";
const LV2_CV_PORT: &str = "http://lv2plug.in/ns/lv2core#CVPort";
const LV2_ATOM_PORT: &str = "http://lv2plug.in/ns/ext/atom#AtomPort";
const LV2_EVENT_PORT: &str = "http://lv2plug.in/ns/ext/event#EventPort";
/// Port class of the LV2 MIDI buffer this host speaks.
pub const LV2_MIDI_PORT: &str = "http://ll-plugins.nongnu.org/lv2/ext/MidiPort";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lv2PluginInfo {
    pub uri: String,
    pub name: String,
}

/// Which of the known LV2 port classes a port declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortTypeFlags {
    pub input: bool,
    pub output: bool,
    pub control: bool,
    pub audio: bool,
    pub midi: bool,
    pub atom: bool,
    pub event: bool,
    pub cv: bool,
}

/// Data type and class of a port from its declared LV2 classes. A MIDI
/// class wins over the float classes; the rate comes from `audio` alone.
pub fn classify_port(flags: &PortTypeFlags) -> (DataType, PortClass) {
    let data_type = if flags.midi {
        DataType::Midi
    } else if flags.control || flags.audio {
        DataType::Float
    } else if flags.atom {
        DataType::Other(LV2_ATOM_PORT.to_string())
    } else if flags.event {
        DataType::Other(LV2_EVENT_PORT.to_string())
    } else if flags.cv {
        DataType::Other(LV2_CV_PORT.to_string())
    } else {
        DataType::Other("unknown".to_string())
    };

    let class = match (flags.input, flags.output, flags.audio) {
        (true, false, false) => PortClass::ControlInput,
        (false, true, false) => PortClass::ControlOutput,
        (true, false, true) => PortClass::AudioInput,
        (false, true, true) => PortClass::AudioOutput,
        _ => PortClass::Unknown,
    };

    (data_type, class)
}

#[derive(Debug, Clone)]
struct Lv2PortInfo {
    symbol: String,
    data_type: DataType,
    class: PortClass,
    default_value: f32,
}

/// Read-only view of the installed plugins.
pub struct Lv2Catalog {
    world: World,
}

impl Default for Lv2Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Lv2Catalog {
    pub fn new() -> Self {
        let world = World::new();
        world.load_all();
        Self { world }
    }

    pub fn list_plugins(&self) -> Vec<Lv2PluginInfo> {
        let mut plugins = self
            .world
            .plugins()
            .iter()
            .filter_map(|plugin| catalog_entry(&plugin))
            .collect::<Vec<_>>();
        plugins.sort_by(|left, right| left.uri.cmp(&right.uri));
        plugins
    }

    pub fn find(&self, uri: &str) -> Option<Lv2PluginInfo> {
        self.plugin_by_uri(uri)
            .and_then(|plugin| catalog_entry(&plugin))
    }

    fn plugin_by_uri(&self, uri: &str) -> Option<Plugin> {
        let uri_node = self.world.new_uri(uri);
        self.world.plugins().plugin(&uri_node)
    }
}

/// Listed and found plugins are the same set: verified, with a URI.
fn catalog_entry(plugin: &Plugin) -> Option<Lv2PluginInfo> {
    if !plugin.verify() {
        return None;
    }
    let uri = plugin.uri().as_uri()?.to_string();
    let name = plugin.name().as_str().unwrap_or(&uri).to_string();
    Some(Lv2PluginInfo { uri, name })
}

enum InstanceState {
    Inactive(Instance),
    Active(ActiveInstance),
}

/// An instantiated LV2 plugin with its port metadata.
pub struct Lv2Plugin {
    uri: String,
    name: String,
    ports: Vec<Lv2PortInfo>,
    instance: Option<InstanceState>,
    _urid_feature: UridMapFeature,
    _world: World,
}

unsafe impl Send for Lv2Plugin {}

impl fmt::Debug for Lv2Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lv2Plugin")
            .field("uri", &self.uri)
            .field("ports", &self.ports.len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Lv2Plugin {
    /// Instantiates `uri` from the catalog, which the plugin then keeps
    /// alive.
    pub fn instantiate(catalog: Lv2Catalog, uri: &str, sample_rate: f64) -> Result<Self, String> {
        let plugin = catalog
            .plugin_by_uri(uri)
            .ok_or_else(|| format!("Failed to find plugin {uri}"))?;
        if !plugin.verify() {
            return Err(format!("Plugin failed verification: {uri}"));
        }
        let name = plugin
            .name()
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| uri.to_string());

        let world = &catalog.world;
        let input_port = world.new_uri(LV2_INPUT_PORT);
        let output_port = world.new_uri(LV2_OUTPUT_PORT);
        let control_port = world.new_uri(LV2_CONTROL_PORT);
        let audio_port = world.new_uri(LV2_AUDIO_PORT);
        let midi_port = world.new_uri(LV2_MIDI_PORT);
        let atom_port = world.new_uri(LV2_ATOM_PORT);
        let event_port = world.new_uri(LV2_EVENT_PORT);
        let cv_port = world.new_uri(LV2_CV_PORT);

        let mut ports = vec![
            Lv2PortInfo {
                symbol: String::new(),
                data_type: DataType::Other("unknown".to_string()),
                class: PortClass::Unknown,
                default_value: 0.0,
            };
            plugin.ports_count()
        ];
        for port in plugin.iter_ports() {
            let index = port.index();
            let flags = PortTypeFlags {
                input: port.is_a(&input_port),
                output: port.is_a(&output_port),
                control: port.is_a(&control_port),
                audio: port.is_a(&audio_port),
                midi: port.is_a(&midi_port),
                atom: port.is_a(&atom_port),
                event: port.is_a(&event_port),
                cv: port.is_a(&cv_port),
            };
            let (data_type, class) = classify_port(&flags);
            let symbol = port
                .symbol()
                .and_then(|node| node.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("port_{index}"));
            let default_value = port
                .range()
                .default
                .and_then(|node| node.as_float())
                .unwrap_or(0.0);
            if let Some(slot) = ports.get_mut(index) {
                *slot = Lv2PortInfo {
                    symbol,
                    data_type,
                    class,
                    default_value,
                };
            }
        }

        let mut urid_feature = UridMapFeature::new()?;
        let instance = instantiate_plugin(&plugin, sample_rate, uri, &mut urid_feature)?;
        debug!("Instantiated {uri} at {sample_rate} Hz");

        Ok(Self {
            uri: uri.to_string(),
            name,
            ports,
            instance: Some(InstanceState::Inactive(instance)),
            _urid_feature: urid_feature,
            _world: catalog.world,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        matches!(self.instance, Some(InstanceState::Active(_)))
    }

    /// Activates the instance. Call after every port is bound.
    pub fn activate(&mut self) {
        self.instance = match self.instance.take() {
            Some(InstanceState::Inactive(instance)) => {
                Some(InstanceState::Active(unsafe { instance.activate() }))
            }
            other => other,
        };
    }

    fn connect_raw<T>(&mut self, index: u32, data: *mut T) {
        match self.instance.as_mut() {
            Some(InstanceState::Inactive(instance)) => unsafe {
                instance.connect_port_mut(index as usize, data);
            },
            Some(InstanceState::Active(instance)) => unsafe {
                instance.instance_mut().connect_port_mut(index as usize, data);
            },
            None => {}
        }
    }
}

impl Drop for Lv2Plugin {
    fn drop(&mut self) {
        if let Some(InstanceState::Active(instance)) = self.instance.take() {
            let _ = unsafe { instance.deactivate() };
        }
        debug!("Freed plugin instance {}", self.uri);
    }
}

impl PluginPorts for Lv2Plugin {
    fn port_count(&self) -> u32 {
        self.ports.len() as u32
    }

    fn port_data_type(&self, index: u32) -> DataType {
        self.ports
            .get(index as usize)
            .map(|port| port.data_type.clone())
            .unwrap_or_else(|| DataType::Other("unknown".to_string()))
    }

    fn port_class(&self, index: u32) -> PortClass {
        self.ports
            .get(index as usize)
            .map_or(PortClass::Unknown, |port| port.class)
    }

    fn port_symbol(&self, index: u32) -> String {
        self.ports
            .get(index as usize)
            .map(|port| port.symbol.clone())
            .unwrap_or_else(|| format!("port_{index}"))
    }

    fn port_default_value(&self, index: u32) -> f32 {
        self.ports
            .get(index as usize)
            .map_or(0.0, |port| port.default_value)
    }
}

impl PortConnector for Lv2Plugin {
    fn connect_control(&mut self, index: u32, value: NonNull<f32>) {
        self.connect_raw(index, value.as_ptr());
    }

    fn connect_audio(&mut self, index: u32, buffer: NonNull<f32>) {
        self.connect_raw(index, buffer.as_ptr());
    }

    fn connect_midi(&mut self, index: u32, buffer: NonNull<EventBuffer>) {
        self.connect_raw(index, buffer.as_ptr());
    }
}

impl PluginInstance for Lv2Plugin {
    fn run(&mut self, frames: u32) {
        if let Some(InstanceState::Active(instance)) = self.instance.as_mut() {
            unsafe {
                instance.run(frames as usize);
            }
        }
    }
}

fn plugin_feature_uris(plugin: &Plugin) -> Vec<String> {
    plugin
        .required_features()
        .iter()
        .filter_map(|feature| {
            feature
                .as_uri()
                .map(str::to_string)
                .or_else(|| feature.as_str().map(str::to_string))
        })
        .collect()
}

fn instantiate_plugin(
    plugin: &Plugin,
    sample_rate: f64,
    uri: &str,
    urid_feature: &mut UridMapFeature,
) -> Result<Instance, String> {
    let required_features = plugin_feature_uris(plugin);
    let features = [urid_feature.feature()];
    unsafe { plugin.instantiate(sample_rate, features) }.ok_or_else(|| {
        if required_features.is_empty() {
            format!("Failed to instantiate plugin {uri}")
        } else {
            format!(
                "Failed to instantiate plugin {uri}. Required features: {}",
                required_features.join(", ")
            )
        }
    })
}

#[derive(Default)]
struct UridMapState {
    next_urid: LV2Urid,
    by_uri: HashMap<String, LV2Urid>,
}

/// `urid:map` host feature. Plugins may call it from any thread.
struct UridMapFeature {
    _uri: CString,
    feature: LV2Feature,
    _map: Box<LV2UridMap>,
    _state: Box<Mutex<UridMapState>>,
}

unsafe impl Send for UridMapFeature {}

impl UridMapFeature {
    fn new() -> Result<Self, String> {
        let mut map = Box::new(LV2UridMap {
            handle: std::ptr::null_mut(),
            map: urid_map_callback,
        });
        let state = Box::new(Mutex::new(UridMapState {
            next_urid: 1,
            by_uri: HashMap::new(),
        }));
        map.handle = (&*state as *const Mutex<UridMapState>) as *mut c_void;

        let uri = feature_uri(LV2_URID__MAP)?;
        let feature = LV2Feature {
            uri: uri.as_ptr(),
            data: (&mut *map as *mut LV2UridMap).cast::<c_void>(),
        };

        Ok(Self {
            _uri: uri,
            feature,
            _map: map,
            _state: state,
        })
    }

    fn feature(&self) -> &LV2Feature {
        &self.feature
    }
}

fn feature_uri(uri: impl AsRef<[u8]>) -> Result<CString, String> {
    let bytes = uri.as_ref();
    let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    CString::new(bytes).map_err(|e| format!("Invalid feature URI: {e}"))
}

extern "C" fn urid_map_callback(handle: LV2UridMapHandle, uri: *const c_char) -> LV2Urid {
    if handle.is_null() || uri.is_null() {
        return 0;
    }
    let Some(uri_str) = unsafe { CStr::from_ptr(uri) }.to_str().ok() else {
        return 0;
    };

    let state_mutex = unsafe { &*(handle as *const Mutex<UridMapState>) };
    let Ok(mut state) = state_mutex.lock() else {
        return 0;
    };

    if let Some(existing) = state.by_uri.get(uri_str).copied() {
        return existing;
    }

    let mapped = state.next_urid;
    state.next_urid = state.next_urid.saturating_add(1);
    state.by_uri.insert(uri_str.to_string(), mapped);
    mapped
}

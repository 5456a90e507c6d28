//! One-time wiring of plugin ports to host memory and server ports.

use tracing::{debug, info, warn};

use crate::midi::EventBuffer;
use crate::plugins::{DataType, PluginPorts, PortClass, PortConnector};
use crate::port::{Direction, Port, PortKind};
use crate::server::{AudioServer, ServerPortType};

/// LV2 MIDI buffer size of the classic JACK host, in bytes.
pub const DEFAULT_MIDI_BUFFER_BYTES: usize = 1024;
pub const DEFAULT_MIDI_BUFFER_EVENTS: usize = 128;

/// Sizing of the event buffers allocated for MIDI ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOptions {
    pub midi_buffer_bytes: usize,
    pub midi_buffer_events: usize,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            midi_buffer_bytes: DEFAULT_MIDI_BUFFER_BYTES,
            midi_buffer_events: DEFAULT_MIDI_BUFFER_EVENTS,
        }
    }
}

/// Why a port was left unbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    UnknownClass,
    AudioRateMidi,
    DataType(String),
}

/// Kind and direction a port gets for its declared data type and class.
pub fn resolve(data_type: &DataType, class: PortClass) -> Result<(PortKind, Direction), Unsupported> {
    match (data_type, class) {
        (DataType::Float, PortClass::ControlInput) => Ok((PortKind::ControlScalar, Direction::Input)),
        (DataType::Float, PortClass::ControlOutput) => {
            Ok((PortKind::ControlScalar, Direction::Output))
        }
        (DataType::Float, PortClass::AudioInput) => Ok((PortKind::AudioStream, Direction::Input)),
        (DataType::Float, PortClass::AudioOutput) => Ok((PortKind::AudioStream, Direction::Output)),
        (DataType::Midi, PortClass::ControlInput) => Ok((PortKind::MidiStream, Direction::Input)),
        (DataType::Midi, PortClass::ControlOutput) => Ok((PortKind::MidiStream, Direction::Output)),
        (DataType::Midi, PortClass::AudioInput | PortClass::AudioOutput) => {
            Err(Unsupported::AudioRateMidi)
        }
        (DataType::Float | DataType::Midi, PortClass::Unknown) => Err(Unsupported::UnknownClass),
        (DataType::Other(uri), _) => Err(Unsupported::DataType(uri.clone())),
    }
}

fn class_direction(class: PortClass) -> Direction {
    match class {
        PortClass::ControlOutput | PortClass::AudioOutput => Direction::Output,
        _ => Direction::Input,
    }
}

/// Binds plugin port `index`: allocates or registers its backing resource
/// and connects the plugin slot where the kind needs it. Unsupported ports
/// are reported and come back unbound; nothing is registered or connected
/// for them.
pub fn bind_port<P, S>(
    plugin: &mut P,
    server: &mut S,
    index: u32,
    options: &BindOptions,
) -> Port<S::Handle>
where
    P: PluginPorts + PortConnector,
    S: AudioServer,
{
    let symbol = plugin.port_symbol(index);
    let data_type = plugin.port_data_type(index);
    let class = plugin.port_class(index);

    let (kind, direction) = match resolve(&data_type, class) {
        Ok(resolved) => resolved,
        Err(reason) => {
            match reason {
                Unsupported::UnknownClass => {
                    warn!("Unknown class for port {index} '{symbol}', ignored");
                }
                Unsupported::AudioRateMidi => {
                    warn!("Audio rate MIDI port {index} '{symbol}', ignored");
                }
                Unsupported::DataType(uri) => {
                    warn!("Unrecognized data type {uri} for port {index} '{symbol}', ignored");
                }
            }
            return Port::unbound(index, symbol, class_direction(class));
        }
    };

    match kind {
        PortKind::ControlScalar => {
            let value = match direction {
                Direction::Input => plugin.port_default_value(index),
                Direction::Output => 0.0,
            };
            let mut port = Port::control(index, symbol, direction, value);
            if let Some(ptr) = port.control_ptr() {
                plugin.connect_control(index, ptr);
            }
            if direction == Direction::Input {
                info!("Set {} to {}", port.symbol(), value);
            }
            port
        }
        PortKind::AudioStream => {
            match server.register_port(&symbol, ServerPortType::Audio, direction) {
                Ok(handle) => {
                    debug!("Registered audio {direction:?} port '{symbol}'");
                    Port::audio(index, symbol, direction, handle)
                }
                Err(e) => {
                    warn!("{e}; port {index} left unconnected");
                    Port::unbound(index, symbol, direction)
                }
            }
        }
        PortKind::MidiStream => match server.register_port(&symbol, ServerPortType::Midi, direction) {
            Ok(handle) => {
                let buffer = EventBuffer::new(options.midi_buffer_bytes, options.midi_buffer_events);
                let mut port = Port::midi(index, symbol, direction, handle, buffer);
                if let Some(midi) = port.midi_binding_mut() {
                    plugin.connect_midi(index, midi.buffer.port_ptr());
                }
                debug!("Registered MIDI {direction:?} port '{}'", port.symbol());
                port
            }
            Err(e) => {
                warn!("{e}; port {index} left unconnected");
                Port::unbound(index, symbol, direction)
            }
        },
        PortKind::Unknown => Port::unbound(index, symbol, direction),
    }
}

/// Binds every plugin port in ascending index order.
pub fn bind_ports<P, S>(plugin: &mut P, server: &mut S, options: &BindOptions) -> Vec<Port<S::Handle>>
where
    P: PluginPorts + PortConnector,
    S: AudioServer,
{
    let count = plugin.port_count();
    let ports: Vec<_> = (0..count)
        .map(|index| bind_port(plugin, server, index, options))
        .collect();
    let bound = ports.iter().filter(|port| port.kind() != PortKind::Unknown).count();
    info!("Bound {bound} of {count} plugin ports");
    ports
}

/// Unregisters every server port and frees the event buffers. Call only
/// after the server has stopped calling the process cycle and the plugin
/// instance is gone.
pub fn release_ports<S: AudioServer>(server: &mut S, ports: impl IntoIterator<Item = Port<S::Handle>>) {
    for port in ports {
        let dropped = port.dropped_events();
        if dropped > 0 {
            warn!("Port '{}' dropped {dropped} MIDI events", port.symbol());
        }
        let symbol = port.symbol().to_string();
        if let Some(handle) = port.into_handle()
            && let Err(e) = server.unregister_port(handle)
        {
            warn!("Failed to unregister port '{symbol}': {e}");
        }
    }
}

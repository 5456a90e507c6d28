//! What the core needs from a loaded plugin.

use std::ptr::NonNull;

use crate::midi::EventBuffer;

pub mod lv2;

/// Declared data type of a plugin port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Float,
    Midi,
    Other(String),
}

/// Rate and direction a plugin declares for a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortClass {
    ControlInput,
    ControlOutput,
    AudioInput,
    AudioOutput,
    Unknown,
}

/// Port metadata, queried once per port while binding.
pub trait PluginPorts {
    fn port_count(&self) -> u32;
    fn port_data_type(&self, index: u32) -> DataType;
    fn port_class(&self, index: u32) -> PortClass;
    fn port_symbol(&self, index: u32) -> String;
    fn port_default_value(&self, index: u32) -> f32;
}

/// Connects plugin port slots to host memory, one method per kind of
/// backing buffer.
///
/// The plugin dereferences the given address on every `run` until the slot
/// is connected again or the plugin is dropped, so the pointee must outlive
/// that.
pub trait PortConnector {
    fn connect_control(&mut self, index: u32, value: NonNull<f32>);
    fn connect_audio(&mut self, index: u32, buffer: NonNull<f32>);
    fn connect_midi(&mut self, index: u32, buffer: NonNull<EventBuffer>);
}

pub trait PluginInstance: PortConnector {
    /// Processes one cycle of `frames` frames. Realtime: implementations must
    /// not allocate, lock or block.
    fn run(&mut self, frames: u32);
}

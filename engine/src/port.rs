use std::ptr::NonNull;

use crate::midi::EventBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortKind {
    #[default]
    Unknown,
    ControlScalar,
    AudioStream,
    MidiStream,
}

/// Backing resource of a MIDI port: the server handle, the buffer the
/// plugin reads or writes, and a count of events lost on this port.
#[derive(Debug)]
pub struct MidiBinding<H> {
    pub(crate) handle: H,
    pub(crate) buffer: Box<EventBuffer>,
    pub(crate) dropped: u64,
}

impl<H> MidiBinding<H> {
    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// What a plugin port is wired to. The variant is the port's kind, so a
/// control value can only exist on a control port and a server handle only
/// on a stream port.
#[derive(Debug)]
pub enum PortBinding<H> {
    Unbound,
    /// Boxed so the address handed to the plugin never moves.
    Control(Box<f32>),
    Audio(H),
    Midi(MidiBinding<H>),
}

impl<H> PortBinding<H> {
    pub fn kind(&self) -> PortKind {
        match self {
            PortBinding::Unbound => PortKind::Unknown,
            PortBinding::Control(_) => PortKind::ControlScalar,
            PortBinding::Audio(_) => PortKind::AudioStream,
            PortBinding::Midi(_) => PortKind::MidiStream,
        }
    }
}

/// Host-side state of one plugin port.
///
/// The binding is fixed once the port is built; outside the crate it can
/// only be read.
///
/// ```compile_fail
/// use lv2host_engine::{Direction, Port, PortBinding};
///
/// let mut port = Port::<u8>::control(0, "gain", Direction::Input, 0.5);
/// *port.binding_mut() = PortBinding::Audio(3);
/// ```
#[derive(Debug)]
pub struct Port<H> {
    index: u32,
    symbol: String,
    direction: Direction,
    binding: PortBinding<H>,
}

impl<H> Port<H> {
    pub fn unbound(index: u32, symbol: impl Into<String>, direction: Direction) -> Self {
        Self::with_binding(index, symbol, direction, PortBinding::Unbound)
    }

    pub fn control(index: u32, symbol: impl Into<String>, direction: Direction, value: f32) -> Self {
        Self::with_binding(index, symbol, direction, PortBinding::Control(Box::new(value)))
    }

    pub fn audio(index: u32, symbol: impl Into<String>, direction: Direction, handle: H) -> Self {
        Self::with_binding(index, symbol, direction, PortBinding::Audio(handle))
    }

    pub fn midi(
        index: u32,
        symbol: impl Into<String>,
        direction: Direction,
        handle: H,
        buffer: EventBuffer,
    ) -> Self {
        Self::with_binding(
            index,
            symbol,
            direction,
            PortBinding::Midi(MidiBinding {
                handle,
                buffer: Box::new(buffer),
                dropped: 0,
            }),
        )
    }

    fn with_binding(
        index: u32,
        symbol: impl Into<String>,
        direction: Direction,
        binding: PortBinding<H>,
    ) -> Self {
        Self {
            index,
            symbol: symbol.into(),
            direction,
            binding,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> PortKind {
        self.binding.kind()
    }

    pub fn binding(&self) -> &PortBinding<H> {
        &self.binding
    }

    pub(crate) fn binding_mut(&mut self) -> &mut PortBinding<H> {
        &mut self.binding
    }

    pub fn control_value(&self) -> Option<f32> {
        match &self.binding {
            PortBinding::Control(value) => Some(**value),
            _ => None,
        }
    }

    /// Stable address of the control value, for the plugin's port slot.
    pub fn control_ptr(&mut self) -> Option<NonNull<f32>> {
        match &mut self.binding {
            PortBinding::Control(value) => Some(NonNull::from(&mut **value)),
            _ => None,
        }
    }

    pub fn midi_binding(&self) -> Option<&MidiBinding<H>> {
        match &self.binding {
            PortBinding::Midi(midi) => Some(midi),
            _ => None,
        }
    }

    pub(crate) fn midi_binding_mut(&mut self) -> Option<&mut MidiBinding<H>> {
        match &mut self.binding {
            PortBinding::Midi(midi) => Some(midi),
            _ => None,
        }
    }

    /// Server handle of an audio or MIDI port.
    pub fn handle(&self) -> Option<&H> {
        match &self.binding {
            PortBinding::Audio(handle) => Some(handle),
            PortBinding::Midi(midi) => Some(&midi.handle),
            _ => None,
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.midi_binding().map_or(0, |midi| midi.dropped)
    }

    /// Gives up the server handle for unregistration. The event buffer, if
    /// any, is freed here.
    pub fn into_handle(self) -> Option<H> {
        match self.binding {
            PortBinding::Audio(handle) => Some(handle),
            PortBinding::Midi(midi) => Some(midi.handle),
            _ => None,
        }
    }
}

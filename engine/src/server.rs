//! What the core needs from the realtime audio server.

use std::ptr::NonNull;

use crate::port::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPortType {
    Audio,
    Midi,
}

/// Port registration. Used on the setup thread only.
pub trait AudioServer {
    type Handle;

    fn register_port(
        &mut self,
        name: &str,
        port_type: ServerPortType,
        direction: Direction,
    ) -> Result<Self::Handle, String>;

    fn unregister_port(&mut self, handle: Self::Handle) -> Result<(), String>;
}

/// Buffer and event access for one process cycle.
///
/// Implementations are called from the realtime thread and must not
/// allocate, lock or block.
pub trait CycleIo {
    type Handle;

    /// Frame count of this cycle.
    fn frames(&self) -> u32;

    /// Server-owned sample buffer of an audio port for this cycle, `None`
    /// for non-audio handles.
    fn audio_buffer(&self, handle: &mut Self::Handle) -> Option<NonNull<f32>>;

    /// Calls `visit(frame, bytes)` for every input event of a MIDI port, in
    /// the order the server delivers them.
    fn read_input_events<F>(&self, handle: &Self::Handle, visit: F)
    where
        F: FnMut(u32, &[u8]);

    /// Clears the output event buffer of a MIDI port, then writes `events`
    /// in order. Returns how many events the server accepted.
    fn write_output_events<'e, I>(&self, handle: &mut Self::Handle, events: I) -> usize
    where
        I: Iterator<Item = (u32, &'e [u8])>;
}

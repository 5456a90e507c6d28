//! Moves MIDI between the server's per-cycle event queues and plugin event
//! buffers. Both directions run on the realtime thread.

use crate::midi::EventBuffer;
use crate::server::CycleIo;

/// Refills `buffer` with this cycle's input events of `handle`, in server
/// order. Events past the buffer's capacity are dropped; returns how many.
pub fn inbound<S: CycleIo>(io: &S, handle: &S::Handle, buffer: &mut EventBuffer) -> u32 {
    buffer.reset();
    let mut dropped = 0_u32;
    io.read_input_events(handle, |frame, bytes| {
        if dropped > 0 || buffer.push(f64::from(frame), bytes).is_err() {
            dropped = dropped.saturating_add(1);
        }
    });
    dropped
}

/// Clears the server output queue of `handle` and writes every event of
/// `buffer` into it, in stored order. Returns how many events the server
/// refused.
pub fn outbound<S: CycleIo>(io: &S, handle: &mut S::Handle, buffer: &EventBuffer) -> u32 {
    let frames = io.frames();
    let total = buffer.len();
    let events = buffer
        .iter()
        .filter_map(|event| frame_offset(event.timestamp, frames).map(|frame| (frame, event.bytes)));
    let written = io.write_output_events(handle, events);
    total.saturating_sub(written).min(u32::MAX as usize) as u32
}

/// Maps a plugin timestamp onto a frame of a `frames`-long cycle: floor,
/// then clamp to `[0, frames - 1]`. NaN lands on frame 0. `None` when the
/// cycle has no frames.
pub fn frame_offset(timestamp: f64, frames: u32) -> Option<u32> {
    let last = frames.checked_sub(1)?;
    if timestamp.is_nan() {
        return Some(0);
    }
    Some(timestamp.floor().clamp(0.0, f64::from(last)) as u32)
}

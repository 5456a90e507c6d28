use std::{fmt, mem::size_of, ptr::NonNull};

/// Bytes in front of every event payload: an `f64` timestamp and a `u32` size.
pub const EVENT_HEADER_BYTES: usize = size_of::<f64>() + size_of::<u32>();

/// Header of an LV2 MIDI port buffer, as seen by the plugin.
#[repr(C)]
#[derive(Debug)]
struct Lv2Midi {
    event_count: u32,
    capacity: u32,
    size: u32,
    data: *mut u8,
}

/// Refusal returned by [`EventBuffer::push`] when an event does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull;

impl fmt::Display for BufferFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MIDI event buffer is full")
    }
}

/// Fixed-capacity event buffer handed to a plugin MIDI port.
///
/// The plugin receives a pointer to this struct, which starts with the LV2
/// MIDI header. Events are packed back to back as
/// `{timestamp: f64, size: u32, bytes[size]}`. Storage is allocated once and
/// never resized; `reset` and `push` are allocation free.
#[repr(C)]
pub struct EventBuffer {
    header: Lv2Midi,
    capacity: usize,
    max_events: u32,
}

unsafe impl Send for EventBuffer {}

impl fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("events", &self.header.event_count)
            .field("size", &self.header.size)
            .field("capacity", &self.capacity)
            .field("max_events", &self.max_events)
            .finish()
    }
}

impl EventBuffer {
    /// Allocates a buffer holding at most `capacity` payload bytes and
    /// `max_events` events. Only call this outside the process cycle.
    pub fn new(capacity: usize, max_events: usize) -> Self {
        let capacity = capacity.min(u32::MAX as usize);
        let storage = vec![0_u8; capacity].into_boxed_slice();
        let data = Box::into_raw(storage).cast::<u8>();
        Self {
            header: Lv2Midi {
                event_count: 0,
                capacity: capacity as u32,
                size: 0,
                data,
            },
            capacity,
            max_events: max_events.min(u32::MAX as usize) as u32,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_events(&self) -> usize {
        self.max_events as usize
    }

    pub fn len(&self) -> usize {
        self.header.event_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.event_count == 0
    }

    /// Bytes currently used by packed events.
    pub fn used(&self) -> usize {
        (self.header.size as usize).min(self.capacity)
    }

    /// Address handed to the plugin's port slot.
    pub fn port_ptr(&mut self) -> NonNull<EventBuffer> {
        NonNull::from(self)
    }

    /// Empties the buffer and restores the header a plugin may have written.
    pub fn reset(&mut self) {
        self.header.event_count = 0;
        self.header.size = 0;
        self.header.capacity = self.capacity as u32;
    }

    /// Appends one event after the last one. Refuses the event when either
    /// the byte capacity or the event ceiling would be exceeded.
    pub fn push(&mut self, timestamp: f64, bytes: &[u8]) -> Result<(), BufferFull> {
        if self.header.event_count >= self.max_events {
            return Err(BufferFull);
        }
        let offset = self.used();
        let needed = EVENT_HEADER_BYTES + bytes.len();
        if needed > self.capacity - offset {
            return Err(BufferFull);
        }

        let storage = self.storage_mut();
        let mut at = offset;
        storage[at..at + size_of::<f64>()].copy_from_slice(&timestamp.to_ne_bytes());
        at += size_of::<f64>();
        storage[at..at + size_of::<u32>()].copy_from_slice(&(bytes.len() as u32).to_ne_bytes());
        at += size_of::<u32>();
        storage[at..at + bytes.len()].copy_from_slice(bytes);

        self.header.size = (offset + needed) as u32;
        self.header.event_count += 1;
        Ok(())
    }

    /// Iterates stored events in order. Iteration stops early at an event
    /// whose declared size runs past the used region.
    pub fn iter(&self) -> Events<'_> {
        Events {
            storage: &self.storage()[..self.used()],
            offset: 0,
            remaining: self.header.event_count,
        }
    }

    fn storage(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.header.data, self.capacity) }
    }

    fn storage_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.header.data, self.capacity) }
    }
}

impl Drop for EventBuffer {
    fn drop(&mut self) {
        let storage = std::ptr::slice_from_raw_parts_mut(self.header.data, self.capacity);
        unsafe { drop(Box::from_raw(storage)) };
    }
}

/// One event borrowed from an [`EventBuffer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRef<'a> {
    pub timestamp: f64,
    pub bytes: &'a [u8],
}

pub struct Events<'a> {
    storage: &'a [u8],
    offset: usize,
    remaining: u32,
}

impl<'a> Iterator for Events<'a> {
    type Item = EventRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let rest = self.storage.get(self.offset..)?;
        if rest.len() < EVENT_HEADER_BYTES {
            self.remaining = 0;
            return None;
        }
        let (time_bytes, rest) = rest.split_at(size_of::<f64>());
        let (size_bytes, rest) = rest.split_at(size_of::<u32>());
        let timestamp = f64::from_ne_bytes(time_bytes.try_into().ok()?);
        let size = u32::from_ne_bytes(size_bytes.try_into().ok()?) as usize;
        let Some(bytes) = rest.get(..size) else {
            self.remaining = 0;
            return None;
        };
        self.offset += EVENT_HEADER_BYTES + size;
        self.remaining -= 1;
        Some(EventRef { timestamp, bytes })
    }
}

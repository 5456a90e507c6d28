//! In-memory plugin and server doubles for unit tests.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    ptr::NonNull,
};

use crate::midi::EventBuffer;
use crate::plugins::{DataType, PluginInstance, PluginPorts, PortClass, PortConnector};
use crate::port::Direction;
use crate::server::{AudioServer, CycleIo, ServerPortType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockHandle {
    pub id: usize,
    pub port_type: ServerPortType,
    pub direction: Direction,
}

impl MockHandle {
    pub fn new(id: usize, port_type: ServerPortType, direction: Direction) -> Self {
        Self {
            id,
            port_type,
            direction,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockServer {
    pub registered: Vec<(String, ServerPortType, Direction)>,
    pub unregistered: Vec<usize>,
    pub refuse: HashSet<String>,
}

impl AudioServer for MockServer {
    type Handle = MockHandle;

    fn register_port(
        &mut self,
        name: &str,
        port_type: ServerPortType,
        direction: Direction,
    ) -> Result<MockHandle, String> {
        if self.refuse.contains(name) {
            return Err(format!("port name '{name}' is taken"));
        }
        let id = self.registered.len();
        self.registered.push((name.to_string(), port_type, direction));
        Ok(MockHandle::new(id, port_type, direction))
    }

    fn unregister_port(&mut self, handle: MockHandle) -> Result<(), String> {
        self.unregistered.push(handle.id);
        Ok(())
    }
}

/// One cycle worth of server buffers, keyed by handle id.
pub struct MockCycle {
    frames: u32,
    audio: HashMap<usize, RefCell<Box<[f32]>>>,
    inputs: HashMap<usize, Vec<(u32, Vec<u8>)>>,
    outputs: RefCell<HashMap<usize, Vec<(u32, Vec<u8>)>>>,
    clears: RefCell<HashMap<usize, usize>>,
    output_limit: Option<usize>,
}

impl MockCycle {
    pub fn new(frames: u32) -> Self {
        Self {
            frames,
            audio: HashMap::new(),
            inputs: HashMap::new(),
            outputs: RefCell::new(HashMap::new()),
            clears: RefCell::new(HashMap::new()),
            output_limit: None,
        }
    }

    pub fn set_input(&mut self, id: usize, events: Vec<(u32, Vec<u8>)>) {
        self.inputs.insert(id, events);
    }

    pub fn preload_output(&self, id: usize, events: Vec<(u32, Vec<u8>)>) {
        self.outputs.borrow_mut().insert(id, events);
    }

    pub fn limit_output(&mut self, limit: usize) {
        self.output_limit = Some(limit);
    }

    pub fn output(&self, id: usize) -> Vec<(u32, Vec<u8>)> {
        self.outputs.borrow().get(&id).cloned().unwrap_or_default()
    }

    pub fn clears(&self, id: usize) -> usize {
        self.clears.borrow().get(&id).copied().unwrap_or(0)
    }

    /// Address of the audio buffer this cycle hands out for `id`.
    pub fn audio_address(&mut self, id: usize) -> *const f32 {
        let frames = self.frames as usize;
        self.audio
            .entry(id)
            .or_insert_with(|| RefCell::new(vec![0.0; frames].into_boxed_slice()))
            .get_mut()
            .as_ptr()
    }
}

impl CycleIo for MockCycle {
    type Handle = MockHandle;

    fn frames(&self) -> u32 {
        self.frames
    }

    fn audio_buffer(&self, handle: &mut MockHandle) -> Option<NonNull<f32>> {
        if handle.port_type != ServerPortType::Audio {
            return None;
        }
        let buffer = self.audio.get(&handle.id)?;
        NonNull::new(buffer.borrow_mut().as_mut_ptr())
    }

    fn read_input_events<F>(&self, handle: &MockHandle, mut visit: F)
    where
        F: FnMut(u32, &[u8]),
    {
        for (frame, bytes) in self.inputs.get(&handle.id).into_iter().flatten() {
            visit(*frame, bytes);
        }
    }

    fn write_output_events<'e, I>(&self, handle: &mut MockHandle, events: I) -> usize
    where
        I: Iterator<Item = (u32, &'e [u8])>,
    {
        *self.clears.borrow_mut().entry(handle.id).or_default() += 1;
        let mut outputs = self.outputs.borrow_mut();
        let queue = outputs.entry(handle.id).or_default();
        queue.clear();
        for (frame, bytes) in events {
            if self.output_limit.is_some_and(|limit| queue.len() >= limit) {
                continue;
            }
            queue.push((frame, bytes.to_vec()));
        }
        queue.len()
    }
}

#[derive(Debug, Clone)]
pub struct MockPortSpec {
    pub data_type: DataType,
    pub class: PortClass,
    pub symbol: String,
    pub default: f32,
}

impl MockPortSpec {
    pub fn new(data_type: DataType, class: PortClass, symbol: &str) -> Self {
        Self {
            data_type,
            class,
            symbol: symbol.to_string(),
            default: 0.0,
        }
    }

    pub fn with_default(mut self, default: f32) -> Self {
        self.default = default;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Control(u32, *mut f32),
    Audio(u32, *mut f32),
    Midi(u32, *mut EventBuffer),
    Run(u32),
}

/// Plugin double that records every call. With `echo` set, `run` copies
/// the events of the first MIDI input slot to the first MIDI output slot.
#[derive(Debug, Default)]
pub struct MockPlugin {
    pub ports: Vec<MockPortSpec>,
    pub calls: Vec<Call>,
    pub echo: bool,
    midi_slots: HashMap<u32, *mut EventBuffer>,
}

impl MockPlugin {
    pub fn new(ports: Vec<MockPortSpec>) -> Self {
        Self {
            ports,
            ..Self::default()
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.calls.iter().filter(|call| !matches!(call, Call::Run(_))).count()
    }

    fn midi_slot(&self, class: PortClass) -> Option<*mut EventBuffer> {
        self.ports
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.data_type == DataType::Midi && spec.class == class)
            .and_then(|(index, _)| self.midi_slots.get(&(index as u32)).copied())
    }
}

impl PluginPorts for MockPlugin {
    fn port_count(&self) -> u32 {
        self.ports.len() as u32
    }

    fn port_data_type(&self, index: u32) -> DataType {
        self.ports[index as usize].data_type.clone()
    }

    fn port_class(&self, index: u32) -> PortClass {
        self.ports[index as usize].class
    }

    fn port_symbol(&self, index: u32) -> String {
        self.ports[index as usize].symbol.clone()
    }

    fn port_default_value(&self, index: u32) -> f32 {
        self.ports[index as usize].default
    }
}

impl PortConnector for MockPlugin {
    fn connect_control(&mut self, index: u32, value: NonNull<f32>) {
        self.calls.push(Call::Control(index, value.as_ptr()));
    }

    fn connect_audio(&mut self, index: u32, buffer: NonNull<f32>) {
        self.calls.push(Call::Audio(index, buffer.as_ptr()));
    }

    fn connect_midi(&mut self, index: u32, buffer: NonNull<EventBuffer>) {
        self.midi_slots.insert(index, buffer.as_ptr());
        self.calls.push(Call::Midi(index, buffer.as_ptr()));
    }
}

impl PluginInstance for MockPlugin {
    fn run(&mut self, frames: u32) {
        self.calls.push(Call::Run(frames));
        if !self.echo {
            return;
        }
        let (Some(input), Some(output)) = (
            self.midi_slot(PortClass::ControlInput),
            self.midi_slot(PortClass::ControlOutput),
        ) else {
            return;
        };
        let (input, output) = unsafe { (&*input, &mut *output) };
        for event in input.iter() {
            if output.push(event.timestamp, event.bytes).is_err() {
                break;
            }
        }
    }
}

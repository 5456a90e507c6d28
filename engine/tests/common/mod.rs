#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, ptr::NonNull};

use lv2host_engine::Direction;
use lv2host_engine::server::{AudioServer, CycleIo, ServerPortType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub id: usize,
    pub port_type: ServerPortType,
    pub direction: Direction,
}

#[derive(Debug, Default)]
pub struct Server {
    pub registered: Vec<(String, ServerPortType, Direction)>,
    pub unregistered: Vec<usize>,
}

impl AudioServer for Server {
    type Handle = Handle;

    fn register_port(
        &mut self,
        name: &str,
        port_type: ServerPortType,
        direction: Direction,
    ) -> Result<Handle, String> {
        let id = self.registered.len();
        self.registered.push((name.to_string(), port_type, direction));
        Ok(Handle {
            id,
            port_type,
            direction,
        })
    }

    fn unregister_port(&mut self, handle: Handle) -> Result<(), String> {
        self.unregistered.push(handle.id);
        Ok(())
    }
}

pub type Events = Vec<(u32, Vec<u8>)>;

/// Server buffers for one cycle; one audio buffer per registered audio port.
/// Audio sits behind `RefCell` since the plugin writes output buffers
/// through pointers handed out from `&self`.
pub struct Cycle {
    frames: u32,
    audio: HashMap<usize, RefCell<Box<[f32]>>>,
    inputs: HashMap<usize, Events>,
    outputs: RefCell<HashMap<usize, Events>>,
}

impl Cycle {
    pub fn new(frames: u32, server: &Server) -> Self {
        let audio = server
            .registered
            .iter()
            .enumerate()
            .filter(|(_, (_, port_type, _))| *port_type == ServerPortType::Audio)
            .map(|(id, _)| (id, RefCell::new(vec![0.0; frames as usize].into_boxed_slice())))
            .collect();
        Self {
            frames,
            audio,
            inputs: HashMap::new(),
            outputs: RefCell::new(HashMap::new()),
        }
    }

    pub fn fill_audio(&mut self, id: usize, value: impl Fn(usize) -> f32) {
        if let Some(buffer) = self.audio.get_mut(&id) {
            for (i, sample) in buffer.get_mut().iter_mut().enumerate() {
                *sample = value(i);
            }
        }
    }

    pub fn audio(&self, id: usize) -> Vec<f32> {
        self.audio
            .get(&id)
            .map(|buffer| buffer.borrow().to_vec())
            .unwrap_or_default()
    }

    pub fn set_input(&mut self, id: usize, events: Events) {
        self.inputs.insert(id, events);
    }

    pub fn output(&self, id: usize) -> Events {
        self.outputs.borrow().get(&id).cloned().unwrap_or_default()
    }
}

impl CycleIo for Cycle {
    type Handle = Handle;

    fn frames(&self) -> u32 {
        self.frames
    }

    fn audio_buffer(&self, handle: &mut Handle) -> Option<NonNull<f32>> {
        let buffer = self.audio.get(&handle.id)?;
        NonNull::new(buffer.borrow_mut().as_mut_ptr())
    }

    fn read_input_events<F>(&self, handle: &Handle, mut visit: F)
    where
        F: FnMut(u32, &[u8]),
    {
        for (frame, bytes) in self.inputs.get(&handle.id).into_iter().flatten() {
            visit(*frame, bytes);
        }
    }

    fn write_output_events<'e, I>(&self, handle: &mut Handle, events: I) -> usize
    where
        I: Iterator<Item = (u32, &'e [u8])>,
    {
        let mut outputs = self.outputs.borrow_mut();
        let queue = outputs.entry(handle.id).or_default();
        queue.clear();
        queue.extend(events.map(|(frame, bytes)| (frame, bytes.to_vec())));
        queue.len()
    }
}

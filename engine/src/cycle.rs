//! Per-cycle driver: input stage, plugin run, output stage.

use crate::midi::translate;
use crate::plugins::PluginInstance;
use crate::port::{Direction, Port, PortBinding};
use crate::server::CycleIo;

/// What the server should do after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Continue,
}

/// Owns the plugin and its bound ports for the lifetime of a session. The
/// port list is fixed once the driver is built.
#[derive(Debug)]
pub struct CycleDriver<P, H> {
    plugin: P,
    ports: Box<[Port<H>]>,
}

impl<P, H> CycleDriver<P, H>
where
    P: PluginInstance,
{
    pub fn new(plugin: P, ports: Vec<Port<H>>) -> Self {
        Self {
            plugin,
            ports: ports.into_boxed_slice(),
        }
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn ports(&self) -> &[Port<H>] {
        &self.ports
    }

    /// Runs one cycle. Never allocates, locks or fails; unbound ports are
    /// skipped in every stage.
    pub fn process<S>(&mut self, io: &S) -> CycleStatus
    where
        S: CycleIo<Handle = H>,
    {
        for port in self.ports.iter_mut() {
            let index = port.index();
            let direction = port.direction();
            match port.binding_mut() {
                PortBinding::Audio(handle) => {
                    if let Some(buffer) = io.audio_buffer(handle) {
                        self.plugin.connect_audio(index, buffer);
                    }
                }
                PortBinding::Midi(midi) => {
                    match direction {
                        Direction::Input => {
                            let dropped = translate::inbound(io, &midi.handle, &mut midi.buffer);
                            midi.dropped = midi.dropped.saturating_add(u64::from(dropped));
                        }
                        Direction::Output => midi.buffer.reset(),
                    }
                    self.plugin.connect_midi(index, midi.buffer.port_ptr());
                }
                PortBinding::Control(_) | PortBinding::Unbound => {}
            }
        }

        self.plugin.run(io.frames());

        for port in self.ports.iter_mut() {
            if port.direction() != Direction::Output {
                continue;
            }
            if let Some(midi) = port.midi_binding_mut() {
                let refused = translate::outbound(io, &mut midi.handle, &midi.buffer);
                midi.dropped = midi.dropped.saturating_add(u64::from(refused));
            }
        }

        CycleStatus::Continue
    }

    /// Splits the driver once the server has stopped calling `process`.
    pub fn into_parts(self) -> (P, Vec<Port<H>>) {
        (self.plugin, self.ports.into_vec())
    }
}

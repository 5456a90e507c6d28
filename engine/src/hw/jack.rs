use std::ptr::NonNull;

use jack::{
    AsyncClient, AudioIn, AudioOut, Client, ClientOptions, Control, MidiIn, MidiOut,
    NotificationHandler, Port, ProcessHandler, ProcessScope, RawMidi,
};
use tracing::{info, warn};

use crate::cycle::{CycleDriver, CycleStatus};
use crate::plugins::PluginInstance;
use crate::port::Direction;
use crate::server::{AudioServer, CycleIo, ServerPortType};

/// A registered JACK port of any of the four types the host uses.
#[derive(Debug)]
pub enum JackPort {
    AudioIn(Port<AudioIn>),
    AudioOut(Port<AudioOut>),
    MidiIn(Port<MidiIn>),
    MidiOut(Port<MidiOut>),
}

/// Opens a client named `client_name`. Unless `start_server` is set, fails
/// when no JACK server is running.
pub fn open_client(client_name: &str, start_server: bool) -> Result<Client, String> {
    let options = if start_server {
        ClientOptions::empty()
    } else {
        ClientOptions::NO_START_SERVER
    };
    let (client, _status) = Client::new(client_name, options)
        .map_err(|e| format!("Failed to create JACK client '{client_name}': {e}"))?;
    if client.name() != client_name {
        info!("JACK assigned client name '{}'", client.name());
    }
    Ok(client)
}

/// Port registration on an inactive or active client.
pub struct JackServer<'a> {
    client: &'a Client,
}

impl<'a> JackServer<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

impl AudioServer for JackServer<'_> {
    type Handle = JackPort;

    fn register_port(
        &mut self,
        name: &str,
        port_type: ServerPortType,
        direction: Direction,
    ) -> Result<JackPort, String> {
        let registered = match (port_type, direction) {
            (ServerPortType::Audio, Direction::Input) => self
                .client
                .register_port(name, AudioIn::default())
                .map(JackPort::AudioIn),
            (ServerPortType::Audio, Direction::Output) => self
                .client
                .register_port(name, AudioOut::default())
                .map(JackPort::AudioOut),
            (ServerPortType::Midi, Direction::Input) => self
                .client
                .register_port(name, MidiIn::default())
                .map(JackPort::MidiIn),
            (ServerPortType::Midi, Direction::Output) => self
                .client
                .register_port(name, MidiOut::default())
                .map(JackPort::MidiOut),
        };
        registered.map_err(|e| format!("Failed to register JACK port '{name}': {e}"))
    }

    fn unregister_port(&mut self, handle: JackPort) -> Result<(), String> {
        let result = match handle {
            JackPort::AudioIn(port) => self.client.unregister_port(port),
            JackPort::AudioOut(port) => self.client.unregister_port(port),
            JackPort::MidiIn(port) => self.client.unregister_port(port),
            JackPort::MidiOut(port) => self.client.unregister_port(port),
        };
        result.map_err(|e| format!("Failed to unregister JACK port: {e}"))
    }
}

/// JACK buffers of one process callback.
pub struct JackCycle<'a> {
    ps: &'a ProcessScope,
}

impl<'a> JackCycle<'a> {
    pub fn new(ps: &'a ProcessScope) -> Self {
        Self { ps }
    }
}

impl CycleIo for JackCycle<'_> {
    type Handle = JackPort;

    fn frames(&self) -> u32 {
        self.ps.n_frames()
    }

    fn audio_buffer(&self, handle: &mut JackPort) -> Option<NonNull<f32>> {
        match handle {
            JackPort::AudioIn(port) => NonNull::new(port.as_slice(self.ps).as_ptr().cast_mut()),
            JackPort::AudioOut(port) => NonNull::new(port.as_mut_slice(self.ps).as_mut_ptr()),
            JackPort::MidiIn(_) | JackPort::MidiOut(_) => None,
        }
    }

    fn read_input_events<F>(&self, handle: &JackPort, mut visit: F)
    where
        F: FnMut(u32, &[u8]),
    {
        if let JackPort::MidiIn(port) = handle {
            for raw in port.iter(self.ps) {
                visit(raw.time, raw.bytes);
            }
        }
    }

    fn write_output_events<'e, I>(&self, handle: &mut JackPort, events: I) -> usize
    where
        I: Iterator<Item = (u32, &'e [u8])>,
    {
        let JackPort::MidiOut(port) = handle else {
            return 0;
        };
        // Creating the writer clears the port buffer.
        let mut writer = port.writer(self.ps);
        let mut written = 0;
        for (time, bytes) in events {
            if writer.write(&RawMidi { time, bytes }).is_ok() {
                written += 1;
            }
        }
        written
    }
}

#[derive(Debug, Default)]
pub struct Notifications;

impl NotificationHandler for Notifications {}

/// Process callback: one driver cycle per JACK cycle.
pub struct Process<P: PluginInstance> {
    driver: CycleDriver<P, JackPort>,
}

impl<P: PluginInstance> Process<P> {
    pub fn new(driver: CycleDriver<P, JackPort>) -> Self {
        Self { driver }
    }

    pub fn into_driver(self) -> CycleDriver<P, JackPort> {
        self.driver
    }
}

impl<P> ProcessHandler for Process<P>
where
    P: PluginInstance + Send + 'static,
{
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let cycle = JackCycle::new(ps);
        match self.driver.process(&cycle) {
            CycleStatus::Continue => Control::Continue,
        }
    }
}

/// An activated client driving a plugin.
pub struct JackSession<P>
where
    P: PluginInstance + Send + 'static,
{
    client: Option<AsyncClient<Notifications, Process<P>>>,
}

impl<P> JackSession<P>
where
    P: PluginInstance + Send + 'static,
{
    /// Activates `client`; JACK starts calling the driver from its realtime
    /// thread.
    pub fn start(client: Client, driver: CycleDriver<P, JackPort>) -> Result<Self, String> {
        let client = client
            .activate_async(Notifications, Process::new(driver))
            .map_err(|e| format!("Failed to activate JACK client: {e}"))?;
        Ok(Self {
            client: Some(client),
        })
    }

    /// Deactivates the client. Once this returns no further cycle runs and
    /// the driver is handed back.
    pub fn stop(mut self) -> Result<(Client, CycleDriver<P, JackPort>), String> {
        let client = self
            .client
            .take()
            .ok_or_else(|| "JACK client already deactivated".to_string())?;
        let (client, _notifications, process) = client
            .deactivate()
            .map_err(|e| format!("Failed to deactivate JACK client: {e}"))?;
        Ok((client, process.into_driver()))
    }
}

impl<P> Drop for JackSession<P>
where
    P: PluginInstance + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(client) = self.client.take()
            && let Err(e) = client.deactivate()
        {
            warn!("Failed to deactivate JACK client: {e}");
        }
    }
}

pub mod binder;
pub mod config;
pub mod cycle;
pub mod hw;
pub mod midi;
pub mod plugins;
pub mod port;
pub mod server;

#[cfg(test)]
mod testing;

pub use binder::{BindOptions, bind_ports, release_ports};
pub use config::HostConfig;
pub use cycle::{CycleDriver, CycleStatus};
pub use port::{Direction, Port, PortBinding, PortKind};

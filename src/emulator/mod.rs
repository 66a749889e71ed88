//! The narrow interface between provisioning and whatever actually runs the hosts

use crate::{
    command::{CommandFailed, CommandResult},
    topology::{Host, Topology},
};

mod netns;
pub use netns::NetnsEmulator;

#[cfg(test)]
pub(crate) mod recording;

#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Setup command `{command}` failed: {source}")]
    Setup {
        command: String,
        source: CommandFailed,
    },
    #[error("Host {0} is not running")]
    NotRunning(String),
    #[error("Device name {0} is longer than 15 characters, try a shorter prefix")]
    NameTooLong(String),
}

/// An engine that can instantiate a [`Topology`] and run shell commands on its hosts.
///
/// Callers issue one command at a time and wait for it to finish.
#[allow(async_fn_in_trait)]
pub trait Emulator {
    /// Instantiate every host, switch and link of the topology
    async fn start(&mut self, topology: &Topology) -> Result<(), EmulatorError>;

    /// Release everything `start` created. Must be safe to call after a partial `start`
    async fn stop(&mut self) -> Result<(), EmulatorError>;

    /// Run a shell command on a host and capture its output
    async fn execute(&mut self, host: &Host, command: &str) -> Result<CommandResult, EmulatorError>;
}

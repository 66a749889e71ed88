//! The labs `labnet` knows how to build

use ipnet::Ipv4Net;

use crate::{
    emulator::Emulator,
    orchestrator::{KeyTool, Orchestrator, ProvisionError},
    topology::Topology,
};

mod docker;
mod netmap;
mod vpn;
pub use docker::{DockerConfig, DockerLab};
pub use netmap::{NetmapConfig, NetmapLab};
pub use vpn::{VpnConfig, VpnLab};

/// A lab: a topology plus the provisioning that brings it to life
#[allow(async_fn_in_trait)]
pub trait Scenario {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Lay out hosts, switches and links
    fn topology(&self) -> Result<Topology, ProvisionError>;

    /// Configure the running topology
    async fn provision<E: Emulator, K: KeyTool>(
        &mut self,
        orchestrator: &mut Orchestrator<'_, E>,
        keys: &mut K,
    ) -> Result<(), ProvisionError>;
}

/// Build a prefix from constant parts
fn prefix(octets: [u8; 4], len: u8) -> Ipv4Net {
    Ipv4Net::new(octets.into(), len).expect("prefix lengths are at most 32")
}

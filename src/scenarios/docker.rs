//! A LAN with one host fronting a container network, the way a Docker host does

use addrplan::IpNetwork;
use ipnet::Ipv4Net;
use serde::Deserialize;

use super::{prefix, Scenario};
use crate::{
    emulator::Emulator,
    orchestrator::{KeyTool, Orchestrator, ProvisionError},
    topology::{HostSpec, LinkSpec, Role, Topology, TopologyBuilder},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DockerConfig {
    pub lan: Ipv4Net,
    /// Network behind `ctrhost`
    pub containers: Ipv4Net,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            lan: prefix([10, 10, 60, 0], 24),
            containers: prefix([10, 60, 0, 0], 16),
        }
    }
}

pub struct DockerLab {
    config: DockerConfig,
}

impl DockerLab {
    #[must_use]
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }
}

impl Scenario for DockerLab {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn topology(&self) -> Result<Topology, ProvisionError> {
        let lan = IpNetwork::new(self.config.lan);
        let containers = IpNetwork::new(self.config.containers);

        let mut builder = TopologyBuilder::new();
        builder
            .add_switch("s0")
            .add_switch("s1")
            .add_host(HostSpec::new("router").address(lan.index(1)?).role(Role::Router))
            .add_host(HostSpec::new("ctrhost").address(lan.index(41)?).role(Role::Router))
            .add_host(HostSpec::new("otherhost").address(lan.index(20)?))
            .add_host(HostSpec::new("ctr1").address(containers.index(2)?));
        for host in ["router", "ctrhost", "otherhost"] {
            builder.add_link(host, "s1");
        }
        builder
            .add_link_spec(LinkSpec::new("ctrhost", "s0").a_address(containers.index(1)?))
            .add_link("ctr1", "s0");
        Ok(builder.build()?)
    }

    async fn provision<E: Emulator, K: KeyTool>(
        &mut self,
        orchestrator: &mut Orchestrator<'_, E>,
        _keys: &mut K,
    ) -> Result<(), ProvisionError> {
        let topology = orchestrator.topology();
        let router = topology.host("router")?.address(0)?;
        let ctrhost = topology.host("ctrhost")?;

        orchestrator.enable_forwarding().await?;
        orchestrator
            .default_routes(&["ctrhost", "otherhost"], router)
            .await?;
        orchestrator
            .default_routes(&["ctr1"], ctrhost.address(1)?)
            .await?;
        orchestrator
            .route("router", self.config.containers, ctrhost.address(0)?)
            .await?;
        Ok(())
    }
}

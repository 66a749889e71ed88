//! Two sites with the same private LAN, made reachable from each other with NETMAP.
//!
//! Each router exposes the other site's LAN under a shared mapped block, so
//! `r0h0` reaches `r1h0` at the mapped block's matching offset.

use std::net::Ipv4Addr;

use addrplan::IpNetwork;
use ipnet::Ipv4Net;
use serde::Deserialize;

use super::{prefix, Scenario};
use crate::{
    emulator::Emulator,
    orchestrator::{KeyTool, Orchestrator, ProvisionError},
    topology::{HostSpec, LinkSpec, Role, Topology, TopologyBuilder},
};

const ROUTERS: [&str; 2] = ["r0", "r1"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetmapConfig {
    /// LAN used, identically, at both sites
    pub lan: Ipv4Net,
    /// Segment joining the routers
    pub transit: Ipv4Net,
    /// Block the remote site is reachable under
    pub mapped: Ipv4Net,
    pub hosts_per_site: u32,
    pub host_offset: u32,
}

impl Default for NetmapConfig {
    fn default() -> Self {
        Self {
            lan: prefix([192, 168, 10, 0], 24),
            transit: prefix([192, 168, 20, 0], 24),
            mapped: prefix([192, 168, 30, 0], 24),
            hosts_per_site: 3,
            host_offset: 10,
        }
    }
}

pub struct NetmapLab {
    config: NetmapConfig,
}

impl NetmapLab {
    #[must_use]
    pub fn new(config: NetmapConfig) -> Self {
        Self { config }
    }

    fn site_hosts(&self, router: &str) -> Vec<String> {
        (0..self.config.hosts_per_site)
            .map(|index| format!("{router}h{index}"))
            .collect()
    }
}

impl Scenario for NetmapLab {
    fn name(&self) -> &'static str {
        "netmap"
    }

    fn topology(&self) -> Result<Topology, ProvisionError> {
        let lan = IpNetwork::new(self.config.lan);
        let transit = IpNetwork::new(self.config.transit);
        let offset = Some(self.config.host_offset);

        let mut builder = TopologyBuilder::new();
        builder.add_switch("s2");
        for (index, router) in ROUTERS.iter().enumerate() {
            let switch = format!("s{index}");
            builder
                .add_host(HostSpec::new(*router).address(lan.index(1)?).role(Role::Router))
                .add_switch(switch.as_str())
                .add_link(switch.as_str(), *router);
        }

        // Both sites draw the same addresses from their own cursor
        let mut sites = [lan.iter_hosts(offset, None)?, lan.iter_hosts(offset, None)?];
        for index in 0..self.config.hosts_per_site {
            for (site, router) in ROUTERS.iter().enumerate() {
                let host = format!("{router}h{index}");
                builder
                    .add_host(HostSpec::new(host.as_str()).address(sites[site].pull()?))
                    .add_link(format!("s{site}"), host);
            }
        }

        for (index, router) in (1..).zip(ROUTERS) {
            builder.add_link_spec(LinkSpec::new(router, "s2").a_address(transit.index(index)?));
        }
        builder
            .add_host(HostSpec::new("nas").address(transit.iter_hosts(offset, None)?.pull()?))
            .add_link("nas", "s2");

        Ok(builder.build()?)
    }

    async fn provision<E: Emulator, K: KeyTool>(
        &mut self,
        orchestrator: &mut Orchestrator<'_, E>,
        _keys: &mut K,
    ) -> Result<(), ProvisionError> {
        let topology = orchestrator.topology();
        orchestrator.enable_forwarding().await?;

        for router in ROUTERS {
            let gateway = topology.host(router)?.address(0)?;
            let hosts = self.site_hosts(router);
            let hosts: Vec<&str> = hosts.iter().map(String::as_str).collect();
            orchestrator.default_routes(&hosts, gateway).await?;
        }

        for (router, peer) in ROUTERS.into_iter().zip(ROUTERS.into_iter().rev()) {
            let peer_transit: Ipv4Addr = topology.host(peer)?.address(1)?;
            orchestrator
                .route(router, self.config.mapped, peer_transit)
                .await?;
            orchestrator
                .netmap(router, self.config.mapped, 1, self.config.lan)
                .await?;
            orchestrator.masquerade(router, None, Some(1)).await?;
        }
        Ok(())
    }
}

//! Two private sites joined by a WireGuard tunnel.
//!
//! Site A sits behind `servera`, which is also reachable on a small public
//! block. Site B sits behind the NAT router `r0`, with `serverb` dialing out
//! to `servera` to bring the tunnel up.

use addrplan::{AddressCursor, IpNetwork};
use ipnet::Ipv4Net;
use serde::Deserialize;

use super::{prefix, Scenario};
use crate::{
    emulator::Emulator,
    orchestrator::{KeyTool, Orchestrator, ProvisionError, TunnelEndpoint, TunnelSpec},
    topology::{HostSpec, LinkSpec, Role, Topology, TopologyBuilder},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VpnConfig {
    /// Block carrying the link between `servera` and `r0`
    pub public_network: Ipv4Net,
    pub site_a: Ipv4Net,
    pub site_b: Ipv4Net,
    /// Block tunnel addresses are drawn from
    pub vpn_network: Ipv4Net,
    /// Offset of the first address handed out from each block
    pub host_offset: u32,
    pub device: String,
    pub listen_port: u16,
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            public_network: prefix([10, 100, 10, 0], 28),
            site_a: prefix([172, 16, 10, 0], 24),
            site_b: prefix([192, 168, 27, 0], 24),
            vpn_network: prefix([10, 200, 10, 0], 28),
            host_offset: 10,
            device: "wg0".to_string(),
            listen_port: 51820,
        }
    }
}

pub struct VpnLab {
    config: VpnConfig,
    vpn_addresses: AddressCursor,
}

impl VpnLab {
    pub fn new(config: VpnConfig) -> Result<Self, addrplan::Error> {
        let vpn_addresses = IpNetwork::new(config.vpn_network).iter_hosts(Some(config.host_offset), None)?;
        Ok(Self {
            config,
            vpn_addresses,
        })
    }

    fn tunnel(&self) -> TunnelSpec {
        TunnelSpec {
            device: self.config.device.clone(),
            listen_port: self.config.listen_port,
            a: TunnelEndpoint {
                host: "servera".into(),
                private_network: self.config.site_a,
                public_interface: 1,
            },
            b: TunnelEndpoint {
                host: "serverb".into(),
                private_network: self.config.site_b,
                public_interface: 0,
            },
            upstream: Some("r0".into()),
        }
    }
}

impl Scenario for VpnLab {
    fn name(&self) -> &'static str {
        "vpn"
    }

    fn topology(&self) -> Result<Topology, ProvisionError> {
        let offset = Some(self.config.host_offset);
        let site_a = IpNetwork::new(self.config.site_a);
        let site_b = IpNetwork::new(self.config.site_b);
        let mut public_addresses = IpNetwork::new(self.config.public_network).iter_hosts(offset, None)?;
        let mut site_a_addresses = site_a.iter_hosts(offset, None)?;
        let mut site_b_addresses = site_b.iter_hosts(offset, None)?;

        let mut builder = TopologyBuilder::new();
        builder
            .add_host(HostSpec::new("vm1").address(site_a_addresses.pull()?))
            .add_host(
                HostSpec::new("servera")
                    .address(site_a.index(1)?)
                    .role(Role::VpnEndpoint),
            )
            .add_host(
                HostSpec::new("serverb")
                    .address(site_b_addresses.pull()?)
                    .role(Role::VpnEndpoint),
            )
            .add_host(HostSpec::new("r0").address(site_b.index(1)?).role(Role::Router))
            .add_host(HostSpec::new("devx").address(site_b_addresses.pull()?))
            .add_host(HostSpec::new("devy").address(site_b_addresses.pull()?))
            .add_switch("sw0")
            .add_switch("sw1")
            .add_link("vm1", "sw0")
            .add_link("servera", "sw0")
            .add_link("sw1", "r0")
            .add_link_spec(
                LinkSpec::new("servera", "r0")
                    .a_address(public_addresses.pull()?)
                    .b_address(public_addresses.pull()?),
            )
            .add_link("serverb", "sw1")
            .add_link("devx", "sw1")
            .add_link("devy", "sw1");
        Ok(builder.build()?)
    }

    async fn provision<E: Emulator, K: KeyTool>(
        &mut self,
        orchestrator: &mut Orchestrator<'_, E>,
        keys: &mut K,
    ) -> Result<(), ProvisionError> {
        let topology = orchestrator.topology();
        let site_a_gateway = topology.host("servera")?.address(0)?;
        let site_b_gateway = topology.host("r0")?.address(0)?;

        orchestrator.enable_forwarding().await?;
        orchestrator
            .default_routes(&["serverb", "devx", "devy"], site_b_gateway)
            .await?;
        orchestrator.default_routes(&["vm1"], site_a_gateway).await?;
        orchestrator
            .masquerade("r0", Some(self.config.site_b), Some(1))
            .await?;

        let spec = self.tunnel();
        orchestrator
            .establish_tunnel(&spec, &mut self.vpn_addresses, keys)
            .await?;

        orchestrator.prime("serverb", site_a_gateway).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::{
        emulator::recording::RecordingEmulator,
        orchestrator::{FakeKeyTool, OrchestratorOptions, PrimerConfig},
    };

    fn options(key_dir: &tempfile::TempDir) -> OrchestratorOptions {
        OrchestratorOptions {
            key_dir: key_dir.path().to_owned(),
            primer: PrimerConfig {
                interval_ms: 1,
                max_attempts: Some(3),
            },
        }
    }

    #[test]
    fn test_topology_addresses() {
        let topology = VpnLab::new(VpnConfig::default()).unwrap().topology().unwrap();
        let address = |host: &str, index| topology.host(host).unwrap().address(index).unwrap();

        assert_eq!(address("vm1", 0), Ipv4Addr::new(172, 16, 10, 10));
        assert_eq!(address("servera", 0), Ipv4Addr::new(172, 16, 10, 1));
        assert_eq!(address("servera", 1), Ipv4Addr::new(10, 100, 10, 10));
        assert_eq!(address("serverb", 0), Ipv4Addr::new(192, 168, 27, 10));
        assert_eq!(address("r0", 0), Ipv4Addr::new(192, 168, 27, 1));
        assert_eq!(address("r0", 1), Ipv4Addr::new(10, 100, 10, 11));
        assert_eq!(address("devx", 0), Ipv4Addr::new(192, 168, 27, 11));
        assert_eq!(address("devy", 0), Ipv4Addr::new(192, 168, 27, 12));
        assert_eq!(topology.host("r0").unwrap().interface(1).unwrap().name, "r0-eth1");
    }

    #[tokio::test]
    async fn test_full_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(&dir);
        let mut lab = VpnLab::new(VpnConfig::default()).unwrap();
        let topology = lab.topology().unwrap();
        let mut emulator = RecordingEmulator::new()
            .respond("sysctl -n", "0\n")
            .fail_times("ping", 2);
        let mut keys = FakeKeyTool::default();

        lab.provision(
            &mut Orchestrator::new(&mut emulator, &topology, &options),
            &mut keys,
        )
        .await
        .unwrap();

        // Peers are keyed against each other
        let servera = emulator.commands_on("servera");
        let serverb = emulator.commands_on("serverb");
        let servera_wg = servera.iter().find(|c| c.starts_with("wg set")).unwrap();
        let serverb_wg = serverb.iter().find(|c| c.starts_with("wg set")).unwrap();
        assert!(servera_wg.contains("peer PUB2= allowed-ips 192.168.27.0/24,10.200.10.0/28"));
        assert!(serverb_wg.contains(
            "peer PUB1= allowed-ips 172.16.10.0/24,10.200.10.0/28 endpoint 10.100.10.10:51820"
        ));
        assert!(servera.contains(&"ip addr add 10.200.10.10/28 dev wg0"));
        assert!(serverb.contains(&"ip addr add 10.200.10.11/28 dev wg0"));

        assert_eq!(
            emulator.commands_on("r0"),
            vec![
                "sysctl -n net.ipv4.ip_forward",
                "sysctl -w net.ipv4.ip_forward=1",
                "iptables -t nat -A POSTROUTING -s 192.168.27.0/24 -o r0-eth1 -j MASQUERADE",
                "ip route add 172.16.10.0/24 via 192.168.27.10",
                "ip route add 10.200.10.0/28 via 192.168.27.10",
            ]
        );
        assert_eq!(emulator.commands_on("vm1"), vec!["ip route add default via 172.16.10.1"]);
        for host in ["devx", "devy"] {
            assert_eq!(
                emulator.commands_on(host),
                vec!["ip route add default via 192.168.27.1"]
            );
        }

        // Stages run in order
        let masquerade = emulator.position("MASQUERADE").unwrap();
        let device = emulator.position("type wireguard").unwrap();
        let first_ping = emulator.position("ping").unwrap();
        assert!(masquerade < device && device < first_ping);
        assert_eq!(emulator.commands.last().unwrap().1, "ping -c1 172.16.10.1");
        assert_eq!(serverb.iter().filter(|c| c.starts_with("ping")).count(), 3);
        assert_eq!(keys.generated, 2);
    }

    #[tokio::test]
    async fn test_masquerade_failure_stops_before_tunnel() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(&dir);
        let mut lab = VpnLab::new(VpnConfig::default()).unwrap();
        let topology = lab.topology().unwrap();
        let mut emulator = RecordingEmulator::new().fail_on("MASQUERADE", 4);
        let mut keys = FakeKeyTool::default();

        let error = lab
            .provision(
                &mut Orchestrator::new(&mut emulator, &topology, &options),
                &mut keys,
            )
            .await
            .unwrap_err();

        assert_eq!(error.command_failure().map(|failure| failure.exit_code), Some(4));
        assert!(!emulator.ran("wireguard"));
        assert!(!emulator.ran("wg set"));
        assert_eq!(keys.generated, 0);
    }

    #[test]
    fn test_config_overrides() {
        let config: VpnConfig =
            serde_json::from_str(r#"{"vpn_network": "10.201.0.0/24", "listen_port": 4500}"#).unwrap();
        assert_eq!(config.vpn_network, "10.201.0.0/24".parse::<Ipv4Net>().unwrap());
        assert_eq!(config.listen_port, 4500);
        assert_eq!(config.site_a, VpnConfig::default().site_a);
    }
}

//! A site-to-site WireGuard tunnel between two VPN endpoints

use std::net::{Ipv4Addr, SocketAddrV4};

use addrplan::AddressCursor;
use ipnet::Ipv4Net;
use netcmd::{
    ip::addr_add,
    link::{link_add, link_up, LinkKind},
    route::route_add,
    wg::PeerConfig,
};

use super::{KeyPair, KeyTool, Orchestrator, ProvisioningPlan, ProvisionError};
use crate::emulator::Emulator;

/// One side of a tunnel
#[derive(Debug, Clone)]
pub struct TunnelEndpoint {
    pub host: String,
    /// The LAN this endpoint fronts
    pub private_network: Ipv4Net,
    /// Interface index the endpoint is reached on by its peer
    pub public_interface: usize,
}

/// Everything needed to wire up a tunnel.
///
/// `a` listens and `b` connects to `a`'s public address. Tunnel addresses
/// come from the cursor handed to [`Orchestrator::establish_tunnel`].
#[derive(Debug, Clone)]
pub struct TunnelSpec {
    pub device: String,
    pub listen_port: u16,
    pub a: TunnelEndpoint,
    pub b: TunnelEndpoint,
    /// Router in front of `b` that needs routes back into the tunnel
    pub upstream: Option<String>,
}

/// A configured tunnel endpoint
#[derive(Debug, Clone)]
pub struct TunnelPeer {
    pub host: String,
    pub tunnel_address: Ipv4Net,
    pub keys: KeyPair,
}

/// Both ends of an established tunnel
#[derive(Debug, Clone)]
pub struct Tunnel {
    pub a: TunnelPeer,
    pub b: TunnelPeer,
}

impl<E: Emulator> Orchestrator<'_, E> {
    /// Create, key, configure and route a tunnel, in that order
    pub async fn establish_tunnel<K: KeyTool>(
        &mut self,
        spec: &TunnelSpec,
        addresses: &mut AddressCursor,
        keys: &mut K,
    ) -> Result<Tunnel, ProvisionError> {
        log::info!("Creating {} on {} and {}", spec.device, spec.a.host, spec.b.host);
        let mut plan = ProvisioningPlan::new();
        for endpoint in [&spec.a, &spec.b] {
            plan.push(&endpoint.host, link_add(&spec.device, &LinkKind::Wireguard));
        }
        self.run(&plan).await?;

        log::info!("Generating keys");
        let a_keys = self.generate_keypair(keys, &spec.a.host).await?;
        let b_keys = self.generate_keypair(keys, &spec.b.host).await?;

        log::info!("Configuring {}", spec.device);
        let tunnel = Tunnel {
            a: TunnelPeer {
                host: spec.a.host.clone(),
                tunnel_address: addresses.pull()?,
                keys: a_keys,
            },
            b: TunnelPeer {
                host: spec.b.host.clone(),
                tunnel_address: addresses.pull()?,
                keys: b_keys,
            },
        };
        let vpn_network = addresses.network().network();
        self.configure_peers(spec, &tunnel, vpn_network).await?;

        log::info!("Routing traffic through {}", spec.device);
        self.route_tunnel(spec, &tunnel, vpn_network).await?;
        Ok(tunnel)
    }

    async fn configure_peers(
        &mut self,
        spec: &TunnelSpec,
        tunnel: &Tunnel,
        vpn_network: Ipv4Net,
    ) -> Result<(), ProvisionError> {
        let topology = self.topology();
        let a_public = topology.host(&spec.a.host)?.address(spec.a.public_interface)?;

        let mut plan = ProvisioningPlan::new();
        plan.push(&spec.a.host, addr_add(tunnel.a.tunnel_address, &spec.device))
            .push(
                &spec.a.host,
                PeerConfig::new(
                    &spec.device,
                    spec.listen_port,
                    &tunnel.a.keys.private_key_file,
                    &tunnel.b.keys.public_key,
                )
                .allow(spec.b.private_network)
                .allow(vpn_network)
                .to_string(),
            )
            .push(&spec.a.host, link_up(&spec.device));

        plan.push(&spec.b.host, addr_add(tunnel.b.tunnel_address, &spec.device))
            .push(
                &spec.b.host,
                PeerConfig::new(
                    &spec.device,
                    spec.listen_port,
                    &tunnel.b.keys.private_key_file,
                    &tunnel.a.keys.public_key,
                )
                .allow(spec.a.private_network)
                .allow(vpn_network)
                .endpoint(SocketAddrV4::new(a_public, spec.listen_port))
                .to_string(),
            )
            .push(&spec.b.host, link_up(&spec.device));

        self.run(&plan).await
    }

    async fn route_tunnel(
        &mut self,
        spec: &TunnelSpec,
        tunnel: &Tunnel,
        vpn_network: Ipv4Net,
    ) -> Result<(), ProvisionError> {
        let own = |peer: &TunnelPeer| -> Ipv4Addr { peer.tunnel_address.addr() };

        let mut plan = ProvisioningPlan::new();
        plan.push(&spec.a.host, route_add(spec.b.private_network, own(&tunnel.a)))
            .push(&spec.b.host, route_add(spec.a.private_network, own(&tunnel.b)));

        if let Some(router) = &spec.upstream {
            let topology = self.topology();
            let b_lan = topology.host(&spec.b.host)?.address(spec.b.public_interface)?;
            plan.push(router, route_add(spec.a.private_network, b_lan))
                .push(router, route_add(vpn_network, b_lan));
        }
        self.run(&plan).await
    }
}

#[cfg(test)]
mod tests {
    use addrplan::IpNetwork;

    use super::*;
    use crate::{
        emulator::recording::RecordingEmulator,
        orchestrator::{FakeKeyTool, OrchestratorOptions},
        topology::{HostSpec, LinkSpec, Role, Topology, TopologyBuilder},
    };

    fn net(cidr: &str) -> Ipv4Net {
        cidr.parse().unwrap()
    }

    fn two_sites() -> Topology {
        let mut builder = TopologyBuilder::new();
        builder
            .add_host(HostSpec::new("left").address(net("172.16.10.1/24")).role(Role::VpnEndpoint))
            .add_host(HostSpec::new("right").address(net("192.168.27.10/24")).role(Role::VpnEndpoint))
            .add_host(HostSpec::new("gw").address(net("192.168.27.1/24")).role(Role::Router))
            .add_switch("sw0")
            .add_switch("sw1")
            .add_link("left", "sw0")
            .add_link("right", "sw1")
            .add_link("gw", "sw1")
            .add_link_spec(
                LinkSpec::new("left", "gw")
                    .a_address(net("10.100.10.10/28"))
                    .b_address(net("10.100.10.11/28")),
            );
        builder.build().unwrap()
    }

    fn spec(upstream: Option<&str>) -> TunnelSpec {
        TunnelSpec {
            device: "wg0".into(),
            listen_port: 51820,
            a: TunnelEndpoint {
                host: "left".into(),
                private_network: net("172.16.10.0/24"),
                public_interface: 1,
            },
            b: TunnelEndpoint {
                host: "right".into(),
                private_network: net("192.168.27.0/24"),
                public_interface: 0,
            },
            upstream: upstream.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn test_tunnel_is_wired_symmetrically() {
        let dir = tempfile::tempdir().unwrap();
        let topology = two_sites();
        let options = OrchestratorOptions {
            key_dir: dir.path().to_owned(),
            ..Default::default()
        };
        let mut emulator = RecordingEmulator::new();
        let mut keys = FakeKeyTool::default();
        let mut addresses = IpNetwork::new(net("10.200.10.0/28"))
            .iter_hosts(Some(10), None)
            .unwrap();

        let tunnel = Orchestrator::new(&mut emulator, &topology, &options)
            .establish_tunnel(&spec(Some("gw")), &mut addresses, &mut keys)
            .await
            .unwrap();

        assert_eq!(tunnel.a.tunnel_address, net("10.200.10.10/28"));
        assert_eq!(tunnel.b.tunnel_address, net("10.200.10.11/28"));
        assert_eq!(tunnel.a.keys.public_key, "PUB1=");
        assert_eq!(tunnel.b.keys.public_key, "PUB2=");

        let left = dir.path().join("left.private");
        let right = dir.path().join("right.private");
        assert_eq!(
            emulator.commands_on("left"),
            vec![
                "ip link add wg0 type wireguard".to_string(),
                "ip addr add 10.200.10.10/28 dev wg0".to_string(),
                format!(
                    "wg set wg0 listen-port 51820 private-key {} peer PUB2= allowed-ips 192.168.27.0/24,10.200.10.0/28",
                    left.display()
                ),
                "ip link set wg0 up".to_string(),
                "ip route add 192.168.27.0/24 via 10.200.10.10".to_string(),
            ]
        );
        assert_eq!(
            emulator.commands_on("right"),
            vec![
                "ip link add wg0 type wireguard".to_string(),
                "ip addr add 10.200.10.11/28 dev wg0".to_string(),
                format!(
                    "wg set wg0 listen-port 51820 private-key {} peer PUB1= allowed-ips 172.16.10.0/24,10.200.10.0/28 endpoint 10.100.10.10:51820",
                    right.display()
                ),
                "ip link set wg0 up".to_string(),
                "ip route add 172.16.10.0/24 via 10.200.10.11".to_string(),
            ]
        );
        assert_eq!(
            emulator.commands_on("gw"),
            vec![
                "ip route add 172.16.10.0/24 via 192.168.27.10",
                "ip route add 10.200.10.0/28 via 192.168.27.10",
            ]
        );
        assert_eq!(addresses.pull().unwrap(), net("10.200.10.12/28"));
    }

    #[tokio::test]
    async fn test_key_dir_with_spaces_is_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = dir.path().join("my keys");
        std::fs::create_dir(&key_dir).unwrap();
        let topology = two_sites();
        let options = OrchestratorOptions {
            key_dir: key_dir.clone(),
            ..Default::default()
        };
        let mut emulator = RecordingEmulator::new();
        let mut keys = FakeKeyTool::default();
        let mut addresses = IpNetwork::new(net("10.200.10.0/28"))
            .iter_hosts(Some(10), None)
            .unwrap();

        Orchestrator::new(&mut emulator, &topology, &options)
            .establish_tunnel(&spec(None), &mut addresses, &mut keys)
            .await
            .unwrap();

        let expected = format!("private-key '{}' peer", key_dir.join("left.private").display());
        let left = emulator.commands_on("left");
        assert!(left.iter().any(|command| command.contains(&expected)));
        assert!(key_dir.join("left.private").exists());
    }

    #[tokio::test]
    async fn test_device_failure_stops_before_keys() {
        let topology = two_sites();
        let options = OrchestratorOptions::default();
        let mut emulator = RecordingEmulator::new().fail_on("type wireguard", 2);
        let mut keys = FakeKeyTool::default();
        let mut addresses = IpNetwork::new(net("10.200.10.0/28"))
            .iter_hosts(Some(10), None)
            .unwrap();

        let error = Orchestrator::new(&mut emulator, &topology, &options)
            .establish_tunnel(&spec(None), &mut addresses, &mut keys)
            .await
            .unwrap_err();
        assert_eq!(error.command_failure().map(|failure| failure.exit_code), Some(2));
        assert_eq!(keys.generated, 0);
        assert_eq!(emulator.commands.len(), 1);
        assert_eq!(addresses.remaining(), 5);
    }

    #[tokio::test]
    async fn test_exhausted_addresses_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let topology = two_sites();
        let options = OrchestratorOptions {
            key_dir: dir.path().to_owned(),
            ..Default::default()
        };
        let mut emulator = RecordingEmulator::new();
        let mut keys = FakeKeyTool::default();
        let mut addresses = IpNetwork::new(net("10.200.10.0/28"))
            .iter_hosts(Some(14), None)
            .unwrap();

        let error = Orchestrator::new(&mut emulator, &topology, &options)
            .establish_tunnel(&spec(None), &mut addresses, &mut keys)
            .await
            .unwrap_err();
        assert!(matches!(error, ProvisionError::Allocation(_)));
        assert!(!emulator.ran("wg set"));
    }
}

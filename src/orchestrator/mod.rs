//! Fail-fast, strictly sequential provisioning of a running topology

use std::{
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use ipnet::Ipv4Net;
use netcmd::{
    nat::{masquerade, netmap},
    route::{default_via, route_add},
    sysctl::{sysctl_get, sysctl_set, IP_FORWARD},
};

use crate::{
    command::{must, CommandFailed},
    emulator::{Emulator, EmulatorError},
    topology::{Topology, TopologyError},
};

mod keys;
mod plan;
mod primer;
mod tunnel;
pub use keys::{KeyPair, KeyTool, PrivateKey, WgKeyTool};
pub use plan::{ProvisioningPlan, Step};
pub use primer::PrimerConfig;
pub use tunnel::{Tunnel, TunnelEndpoint, TunnelPeer, TunnelSpec};

#[cfg(test)]
pub(crate) use keys::tests::FakeKeyTool;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("`{}` on {} failed with status {}: {}", .command, .host, .source.exit_code, .source.stderr.trim())]
    Command {
        host: String,
        command: String,
        #[source]
        source: CommandFailed,
    },
    #[error("Key generation for {} failed with status {}: {}", .host, .source.exit_code, .source.stderr.trim())]
    KeyGeneration {
        host: String,
        #[source]
        source: CommandFailed,
    },
    #[error("Failed to run the key tool: {0}")]
    KeyTool(#[source] std::io::Error),
    #[error("Failed to write private key {}: {}", .path.display(), .source)]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{target} still unreachable from {host} after {attempts} attempts")]
    PrimingTimeout {
        host: String,
        target: Ipv4Addr,
        attempts: u32,
    },
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Allocation(#[from] addrplan::Error),
    #[error(transparent)]
    Emulator(#[from] EmulatorError),
}

impl ProvisionError {
    /// The failed command behind this error, if a command is what failed
    #[must_use]
    pub fn command_failure(&self) -> Option<&CommandFailed> {
        match self {
            ProvisionError::Command { source, .. } | ProvisionError::KeyGeneration { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Knobs that do not belong to any one scenario
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Where private keys are written
    pub key_dir: PathBuf,
    pub primer: PrimerConfig,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("."),
            primer: PrimerConfig::default(),
        }
    }
}

/// Drives commands against the hosts of a running topology.
///
/// Every command goes through [`must`], so the first failure ends the run.
/// Nothing is rolled back.
pub struct Orchestrator<'a, E: Emulator> {
    emulator: &'a mut E,
    topology: &'a Topology,
    options: &'a OrchestratorOptions,
}

impl<'a, E: Emulator> Orchestrator<'a, E> {
    pub fn new(emulator: &'a mut E, topology: &'a Topology, options: &'a OrchestratorOptions) -> Self {
        Self {
            emulator,
            topology,
            options,
        }
    }

    #[must_use]
    pub fn topology(&self) -> &'a Topology {
        self.topology
    }

    #[must_use]
    pub fn key_dir(&self) -> &Path {
        &self.options.key_dir
    }

    /// Run one command on a host, failing on a non-zero exit
    pub async fn exec(&mut self, host: &str, command: &str) -> Result<(String, String), ProvisionError> {
        let node = self.topology.host(host)?;
        log::debug!("[{}] {}", host, command);
        let result = self.emulator.execute(node, command).await?;
        if !result.stdout.is_empty() {
            log::trace!("[{}] stdout: {}", host, result.stdout.trim_end());
        }
        if !result.stderr.is_empty() {
            log::trace!("[{}] stderr: {}", host, result.stderr.trim_end());
        }
        must(result).map_err(|source| ProvisionError::Command {
            host: host.to_owned(),
            command: command.to_owned(),
            source,
        })
    }

    /// Execute every step of a plan in order
    pub async fn run(&mut self, plan: &ProvisioningPlan) -> Result<(), ProvisionError> {
        log::trace!("Running a plan of {} steps", plan.len());
        for step in plan {
            self.exec(&step.host, &step.command).await?;
        }
        Ok(())
    }

    /// Name of a host's interface, for rules that match on interfaces
    fn interface_name(&self, host: &str, index: usize) -> Result<&'a str, ProvisionError> {
        let topology = self.topology;
        topology
            .host(host)?
            .interface(index)
            .map(|interface| interface.name.as_str())
            .ok_or_else(|| {
                ProvisionError::Topology(TopologyError::MissingInterface {
                    host: host.to_owned(),
                    index,
                })
            })
    }

    /// Make sure every router and VPN endpoint forwards IPv4 traffic
    pub async fn enable_forwarding(&mut self) -> Result<(), ProvisionError> {
        let topology = self.topology;
        let forwarders: Vec<&str> = topology
            .hosts()
            .iter()
            .filter(|host| host.role().forwards())
            .map(|host| host.name())
            .collect();
        log::info!("Enabling forwarding on {}", forwarders.join(", "));

        for host in forwarders {
            let (current, _) = self.exec(host, &sysctl_get(IP_FORWARD)).await?;
            if current.trim() == "1" {
                log::debug!("Forwarding already enabled on {}", host);
                continue;
            }
            self.exec(host, &sysctl_set(IP_FORWARD, "1")).await?;
        }
        Ok(())
    }

    /// Point the default route of every listed host at a gateway
    pub async fn default_routes(&mut self, hosts: &[&str], gateway: Ipv4Addr) -> Result<(), ProvisionError> {
        log::info!("Configuring default routes via {} on {}", gateway, hosts.join(", "));
        let mut plan = ProvisioningPlan::new();
        for host in hosts {
            plan.push(*host, default_via(gateway));
        }
        self.run(&plan).await
    }

    /// Masquerade traffic leaving a router.
    ///
    /// `source` limits the rule to one private prefix and `out_interface`
    /// selects the router's external-facing interface by index.
    pub async fn masquerade(
        &mut self,
        router: &str,
        source: Option<Ipv4Net>,
        out_interface: Option<usize>,
    ) -> Result<(), ProvisionError> {
        let out_interface = out_interface
            .map(|index| self.interface_name(router, index))
            .transpose()?;
        log::info!("Configuring masquerading on {}", router);
        self.exec(router, &masquerade(source, out_interface)).await?;
        Ok(())
    }

    /// Translate inbound traffic for `destination` onto `to` as it enters a router
    pub async fn netmap(
        &mut self,
        router: &str,
        destination: Ipv4Net,
        in_interface: usize,
        to: Ipv4Net,
    ) -> Result<(), ProvisionError> {
        let in_interface = self.interface_name(router, in_interface)?;
        log::info!("Mapping {} onto {} on {}", destination, to, router);
        self.exec(router, &netmap(destination, in_interface, to)).await?;
        Ok(())
    }

    /// Add a static route on a host
    pub async fn route(&mut self, host: &str, destination: Ipv4Net, gateway: Ipv4Addr) -> Result<(), ProvisionError> {
        log::info!("Routing {} via {} on {}", destination, gateway, host);
        self.exec(host, &route_add(destination, gateway)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emulator::recording::RecordingEmulator,
        topology::{HostSpec, LinkSpec, Role, TopologyBuilder},
    };

    fn net(cidr: &str) -> Ipv4Net {
        cidr.parse().unwrap()
    }

    fn lan() -> Topology {
        let mut builder = TopologyBuilder::new();
        builder
            .add_host(HostSpec::new("r0").address(net("192.168.10.1/24")).role(Role::Router))
            .add_host(HostSpec::new("h0").address(net("192.168.10.10/24")))
            .add_host(HostSpec::new("h1").address(net("192.168.10.11/24")))
            .add_host(HostSpec::new("nas").address(net("192.168.20.10/24")))
            .add_switch("s0")
            .add_switch("s2")
            .add_link("s0", "r0")
            .add_link("h0", "s0")
            .add_link("h1", "s0")
            .add_link_spec(LinkSpec::new("r0", "s2").a_address(net("192.168.20.1/24")))
            .add_link("nas", "s2");
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_plan_runs_in_order() {
        let topology = lan();
        let options = OrchestratorOptions::default();
        let mut emulator = RecordingEmulator::new();
        let mut plan = ProvisioningPlan::new();
        plan.push("h0", "first").push("r0", "second").push("h1", "third");
        assert_eq!(plan.len(), 3);

        Orchestrator::new(&mut emulator, &topology, &options)
            .run(&plan)
            .await
            .unwrap();
        assert_eq!(
            emulator.commands,
            vec![
                ("h0".to_string(), "first".to_string()),
                ("r0".to_string(), "second".to_string()),
                ("h1".to_string(), "third".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_plan_stops_at_first_failure() {
        let topology = lan();
        let options = OrchestratorOptions::default();
        let mut emulator = RecordingEmulator::new().fail_on("second", 2);
        let mut plan = ProvisioningPlan::new();
        plan.push("h0", "first").push("r0", "second").push("h1", "third");

        let error = Orchestrator::new(&mut emulator, &topology, &options)
            .run(&plan)
            .await
            .unwrap_err();
        match error {
            ProvisionError::Command { host, command, source } => {
                assert_eq!(host, "r0");
                assert_eq!(command, "second");
                assert_eq!(source.exit_code, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!emulator.ran("third"));
    }

    #[tokio::test]
    async fn test_unknown_host_fails_before_running() {
        let topology = lan();
        let options = OrchestratorOptions::default();
        let mut emulator = RecordingEmulator::new();
        let error = Orchestrator::new(&mut emulator, &topology, &options)
            .exec("s0", "true")
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ProvisionError::Topology(TopologyError::UnknownHost(name)) if name == "s0"
        ));
        assert!(emulator.commands.is_empty());
    }

    #[tokio::test]
    async fn test_forwarding_only_touches_forwarders_that_need_it() {
        let topology = lan();
        let options = OrchestratorOptions::default();
        let mut emulator = RecordingEmulator::new().respond("sysctl -n", "0\n");
        Orchestrator::new(&mut emulator, &topology, &options)
            .enable_forwarding()
            .await
            .unwrap();
        assert_eq!(
            emulator.commands_on("r0"),
            vec!["sysctl -n net.ipv4.ip_forward", "sysctl -w net.ipv4.ip_forward=1"]
        );
        assert!(emulator.commands_on("h0").is_empty());

        let mut emulator = RecordingEmulator::new().respond("sysctl -n", "1\n");
        Orchestrator::new(&mut emulator, &topology, &options)
            .enable_forwarding()
            .await
            .unwrap();
        assert_eq!(emulator.commands_on("r0"), vec!["sysctl -n net.ipv4.ip_forward"]);
    }

    #[tokio::test]
    async fn test_nat_rules_use_interface_names() {
        let topology = lan();
        let options = OrchestratorOptions::default();
        let mut emulator = RecordingEmulator::new();
        let mut orchestrator = Orchestrator::new(&mut emulator, &topology, &options);
        orchestrator
            .default_routes(&["h0", "h1"], Ipv4Addr::new(192, 168, 10, 1))
            .await
            .unwrap();
        orchestrator
            .netmap("r0", net("192.168.30.0/24"), 1, net("192.168.10.0/24"))
            .await
            .unwrap();
        orchestrator.masquerade("r0", None, Some(1)).await.unwrap();
        orchestrator
            .route("r0", net("192.168.30.0/24"), Ipv4Addr::new(192, 168, 20, 2))
            .await
            .unwrap();

        assert_eq!(
            emulator.commands_on("h0"),
            vec!["ip route add default via 192.168.10.1"]
        );
        assert_eq!(
            emulator.commands_on("r0"),
            vec![
                "iptables -t nat -A PREROUTING -d 192.168.30.0/24 -i r0-eth1 -j NETMAP --to 192.168.10.0/24",
                "iptables -t nat -A POSTROUTING -o r0-eth1 -j MASQUERADE",
                "ip route add 192.168.30.0/24 via 192.168.20.2",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_interface_is_reported() {
        let topology = lan();
        let options = OrchestratorOptions::default();
        let mut emulator = RecordingEmulator::new();
        let error = Orchestrator::new(&mut emulator, &topology, &options)
            .masquerade("h0", None, Some(4))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ProvisionError::Topology(TopologyError::MissingInterface { index: 4, .. })
        ));
    }
}

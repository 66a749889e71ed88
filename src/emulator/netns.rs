use ipnet::Ipv4Net;
use netcmd::{
    ip::addr_add,
    link::{link_add, link_add_netns, link_del, link_master, link_up, LinkKind},
    netns::{exec_argv, netns_add, netns_del},
};
use tokio::process::Command;

use super::{Emulator, EmulatorError};
use crate::{
    command::{must, CommandResult},
    topology::{Host, NodeRef, Topology, MAX_INTERFACE_NAME_LEN},
};

/// Runs every host in its own network namespace.
///
/// Switches become Linux bridges in the root namespace and links become veth
/// pairs. Everything left in the root namespace carries the prefix, so labs
/// with different prefixes can run side by side.
#[derive(Debug)]
pub struct NetnsEmulator {
    /// Prepended to host names to build namespace names, and to root namespace devices
    prefix: String,
    /// Namespaces created so far, in creation order
    namespaces: Vec<String>,
    /// Bridges created so far
    bridges: Vec<String>,
    /// Pairs with both ends in the root namespace. Deleting a namespace does not take these along
    root_links: Vec<String>,
}

/// Where one end of a veth pair lives
#[derive(Debug, Clone, PartialEq, Eq)]
enum End {
    /// Inside a host's namespace
    Host {
        namespace: String,
        name: String,
        address: Option<Ipv4Net>,
    },
    /// In the root namespace, attached to a bridge
    Port { name: String, bridge: String },
}

impl End {
    fn name(&self) -> &str {
        match self {
            End::Host { name, .. } | End::Port { name, .. } => name,
        }
    }

    fn namespace(&self) -> Option<&str> {
        match self {
            End::Host { namespace, .. } => Some(namespace),
            End::Port { .. } => None,
        }
    }
}

impl NetnsEmulator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            namespaces: Vec::new(),
            bridges: Vec::new(),
            root_links: Vec::new(),
        }
    }

    fn namespace(&self, host: &str) -> String {
        format!("{}{}", self.prefix, host)
    }

    /// Name of a device living in the root namespace
    fn root_name(&self, name: &str) -> Result<String, EmulatorError> {
        let name = format!("{}{}", self.prefix, name);
        if name.len() > MAX_INTERFACE_NAME_LEN {
            return Err(EmulatorError::NameTooLong(name));
        }
        Ok(name)
    }

    fn end(&self, topology: &Topology, (node, index): (NodeRef, usize)) -> Result<End, EmulatorError> {
        let interface = topology.endpoint((node, index));
        Ok(match node {
            NodeRef::Host(host) => End::Host {
                namespace: self.namespace(topology.hosts()[host].name()),
                name: interface.name.clone(),
                address: interface.address,
            },
            NodeRef::Switch(switch) => End::Port {
                name: self.root_name(&interface.name)?,
                bridge: self.root_name(topology.switches()[switch].name())?,
            },
        })
    }

    /// Run a command in the root namespace
    async fn run_root(&self, command: &str) -> Result<CommandResult, EmulatorError> {
        log::trace!("(root) {}", command);
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map(CommandResult::from)
            .map_err(|source| EmulatorError::Spawn {
                command: command.to_owned(),
                source,
            })
    }

    /// Run a command inside a namespace
    async fn run_in(&self, namespace: &str, command: &str) -> Result<CommandResult, EmulatorError> {
        log::trace!("({}) {}", namespace, command);
        Command::new("ip")
            .args(exec_argv(namespace, command))
            .output()
            .await
            .map(CommandResult::from)
            .map_err(|source| EmulatorError::Spawn {
                command: command.to_owned(),
                source,
            })
    }

    async fn setup_root(&self, command: &str) -> Result<(), EmulatorError> {
        must(self.run_root(command).await?).map_err(|source| EmulatorError::Setup {
            command: command.to_owned(),
            source,
        })?;
        Ok(())
    }

    async fn setup_in(&self, namespace: &str, command: &str) -> Result<(), EmulatorError> {
        must(self.run_in(namespace, command).await?).map_err(|source| EmulatorError::Setup {
            command: command.to_owned(),
            source,
        })?;
        Ok(())
    }

    /// Address and bring up one end of a freshly created veth pair
    async fn place(&self, end: &End) -> Result<(), EmulatorError> {
        match end {
            End::Host {
                namespace,
                name,
                address,
            } => {
                if let Some(address) = address {
                    self.setup_in(namespace, &addr_add(*address, name)).await?;
                }
                self.setup_in(namespace, &link_up(name)).await
            }
            End::Port { name, bridge } => {
                self.setup_root(&link_master(name, bridge)).await?;
                self.setup_root(&link_up(name)).await
            }
        }
    }
}

impl Emulator for NetnsEmulator {
    async fn start(&mut self, topology: &Topology) -> Result<(), EmulatorError> {
        // Resolve every root namespace name up front so a long prefix fails before anything exists
        let bridges = topology
            .switches()
            .iter()
            .map(|switch| self.root_name(switch.name()))
            .collect::<Result<Vec<_>, _>>()?;
        let links = topology
            .links()
            .iter()
            .map(|link| Ok((self.end(topology, link.a)?, self.end(topology, link.b)?)))
            .collect::<Result<Vec<_>, EmulatorError>>()?;

        for host in topology.hosts() {
            let namespace = self.namespace(host.name());
            log::debug!("Creating namespace {} for {}", namespace, host.name());
            self.setup_root(&netns_add(&namespace)).await?;
            self.namespaces.push(namespace.clone());
            self.setup_in(&namespace, &link_up("lo")).await?;
        }

        for bridge in bridges {
            log::debug!("Creating bridge {}", bridge);
            self.setup_root(&link_add(&bridge, &LinkKind::Bridge)).await?;
            self.bridges.push(bridge.clone());
            self.setup_root(&link_up(&bridge)).await?;
        }

        for (a, b) in links {
            log::debug!("Linking {} <-> {}", a.name(), b.name());
            let kind = LinkKind::Veth {
                peer: b.name().to_owned(),
                netns: b.namespace().map(str::to_owned),
            };
            let command = match a.namespace() {
                Some(namespace) => link_add_netns(a.name(), namespace, &kind),
                None => link_add(a.name(), &kind),
            };
            self.setup_root(&command).await?;
            if a.namespace().is_none() && b.namespace().is_none() {
                self.root_links.push(a.name().to_owned());
            }
            self.place(&a).await?;
            self.place(&b).await?;
        }

        log::info!(
            "Started {} hosts and {} switches",
            self.namespaces.len(),
            self.bridges.len()
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EmulatorError> {
        // Deleting a namespace takes every veth inside it (and their peers) along
        for namespace in std::mem::take(&mut self.namespaces).iter().rev() {
            match self.run_root(&netns_del(namespace)).await.map(must) {
                Ok(Ok(_)) => log::debug!("Deleted namespace {}", namespace),
                Ok(Err(error)) => log::warn!("Failed to delete namespace {}: {}", namespace, error),
                Err(error) => log::warn!("{}", error),
            }
        }
        for link in std::mem::take(&mut self.root_links) {
            match self.run_root(&link_del(&link)).await.map(must) {
                Ok(Ok(_)) => log::debug!("Deleted link {}", link),
                Ok(Err(error)) => log::warn!("Failed to delete link {}: {}", link, error),
                Err(error) => log::warn!("{}", error),
            }
        }
        for bridge in std::mem::take(&mut self.bridges) {
            match self.run_root(&link_del(&bridge)).await.map(must) {
                Ok(Ok(_)) => log::debug!("Deleted bridge {}", bridge),
                Ok(Err(error)) => log::warn!("Failed to delete bridge {}: {}", bridge, error),
                Err(error) => log::warn!("{}", error),
            }
        }
        Ok(())
    }

    async fn execute(&mut self, host: &Host, command: &str) -> Result<CommandResult, EmulatorError> {
        let namespace = self.namespace(host.name());
        if !self.namespaces.contains(&namespace) {
            return Err(EmulatorError::NotRunning(host.name().to_owned()));
        }
        self.run_in(&namespace, command).await
    }
}

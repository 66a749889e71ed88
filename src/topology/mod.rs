//! Declarative description of an emulated network

use std::{collections::HashMap, fmt, net::Ipv4Addr};

use ipnet::Ipv4Net;

mod builder;
mod error;
pub(crate) use builder::MAX_INTERFACE_NAME_LEN;
pub use builder::{HostSpec, LinkSpec, TopologyBuilder};
pub use error::TopologyError;

/// What a host is for. Routers and VPN endpoints forward traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Router,
    VpnEndpoint,
}

impl Role {
    /// Whether hosts in this role need packet forwarding enabled
    #[must_use]
    pub fn forwards(self) -> bool {
        matches!(self, Role::Router | Role::VpnEndpoint)
    }
}

/// One end of a link, as seen from the node that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name, eg. `servera-eth1`
    pub name: String,
    /// Position of this interface on its node
    pub index: usize,
    /// Address assigned to the interface, if any
    pub address: Option<Ipv4Net>,
}

/// An emulated host
#[derive(Debug, Clone)]
pub struct Host {
    name: String,
    role: Role,
    interfaces: Vec<Interface>,
}

impl Host {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    #[must_use]
    pub fn interface(&self, index: usize) -> Option<&Interface> {
        self.interfaces.get(index)
    }

    /// The bare address configured on an interface
    pub fn address(&self, index: usize) -> Result<Ipv4Addr, TopologyError> {
        self.interface(index)
            .and_then(|interface| interface.address)
            .map(|address| address.addr())
            .ok_or_else(|| TopologyError::MissingAddress {
                host: self.name.clone(),
                index,
            })
    }
}

/// An emulated L2 switch
#[derive(Debug, Clone)]
pub struct Switch {
    name: String,
    ports: Vec<Interface>,
}

impl Switch {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn ports(&self) -> &[Interface] {
        &self.ports
    }
}

/// Which side of a link an endpoint lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Host(usize),
    Switch(usize),
}

/// A point-to-point link between two interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Node and interface index of the first end
    pub a: (NodeRef, usize),
    /// Node and interface index of the second end
    pub b: (NodeRef, usize),
}

/// A fully resolved network. Immutable once built.
#[derive(Debug, Clone)]
pub struct Topology {
    hosts: Vec<Host>,
    switches: Vec<Switch>,
    links: Vec<Link>,
    names: HashMap<String, NodeRef>,
}

impl Topology {
    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    #[must_use]
    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Resolve a host by name
    pub fn host(&self, name: &str) -> Result<&Host, TopologyError> {
        match self.names.get(name) {
            Some(NodeRef::Host(index)) => Ok(&self.hosts[*index]),
            _ => Err(TopologyError::UnknownHost(name.to_owned())),
        }
    }

    /// Look up the interface at one end of a link
    #[must_use]
    pub fn endpoint(&self, (node, index): (NodeRef, usize)) -> &Interface {
        match node {
            NodeRef::Host(host) => &self.hosts[host].interfaces[index],
            NodeRef::Switch(switch) => &self.switches[switch].ports[index],
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hosts:")?;
        for host in &self.hosts {
            writeln!(f, "  {} ({:?})", host.name, host.role)?;
            for interface in &host.interfaces {
                match interface.address {
                    Some(address) => writeln!(f, "    {} {}", interface.name, address)?,
                    None => writeln!(f, "    {}", interface.name)?,
                }
            }
        }
        writeln!(f, "switches:")?;
        for switch in &self.switches {
            writeln!(f, "  {}", switch.name)?;
        }
        writeln!(f, "links:")?;
        for link in &self.links {
            writeln!(
                f,
                "  {} <-> {}",
                self.endpoint(link.a).name,
                self.endpoint(link.b).name
            )?;
        }
        Ok(())
    }
}

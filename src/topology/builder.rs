use std::collections::HashMap;

use ipnet::Ipv4Net;

use super::{Host, Interface, Link, NodeRef, Role, Switch, Topology, TopologyError};

/// Linux refuses interface names longer than `IFNAMSIZ - 1`
pub(crate) const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Declaration of a host before it is placed in a topology
#[derive(Debug, Clone)]
pub struct HostSpec {
    name: String,
    address: Option<Ipv4Net>,
    role: Role,
}

impl HostSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            role: Role::Host,
        }
    }

    /// Address for the host's first interface
    #[must_use]
    pub fn address(mut self, address: Ipv4Net) -> Self {
        self.address = Some(address);
        self
    }

    #[must_use]
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Declaration of a link. Each end may override the address of the interface it creates.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    a: String,
    b: String,
    a_address: Option<Ipv4Net>,
    b_address: Option<Ipv4Net>,
}

impl LinkSpec {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            a_address: None,
            b_address: None,
        }
    }

    #[must_use]
    pub fn a_address(mut self, address: Ipv4Net) -> Self {
        self.a_address = Some(address);
        self
    }

    #[must_use]
    pub fn b_address(mut self, address: Ipv4Net) -> Self {
        self.b_address = Some(address);
        self
    }
}

/// Collects hosts, switches and links, then resolves them into a [`Topology`]
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    hosts: Vec<HostSpec>,
    switches: Vec<String>,
    links: Vec<LinkSpec>,
}

impl TopologyBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(&mut self, spec: HostSpec) -> &mut Self {
        self.hosts.push(spec);
        self
    }

    pub fn add_switch(&mut self, name: impl Into<String>) -> &mut Self {
        self.switches.push(name.into());
        self
    }

    /// Add a plain L2 link without any address overrides
    pub fn add_link(&mut self, a: impl Into<String>, b: impl Into<String>) -> &mut Self {
        self.add_link_spec(LinkSpec::new(a, b))
    }

    pub fn add_link_spec(&mut self, spec: LinkSpec) -> &mut Self {
        self.links.push(spec);
        self
    }

    /// Resolve every name and assign interfaces in declaration order.
    ///
    /// Interfaces are named `<node>-eth<N>`, counting up per node in the order
    /// links were added. A host's own address lands on its first interface
    /// unless the link creating that interface overrides it.
    pub fn build(&self) -> Result<Topology, TopologyError> {
        let mut names = HashMap::new();
        let mut hosts = Vec::with_capacity(self.hosts.len());
        let mut switches = Vec::with_capacity(self.switches.len());

        for (index, spec) in self.hosts.iter().enumerate() {
            if names.insert(spec.name.clone(), NodeRef::Host(index)).is_some() {
                return Err(TopologyError::DuplicateName(spec.name.clone()));
            }
            hosts.push(Host {
                name: spec.name.clone(),
                role: spec.role,
                interfaces: Vec::new(),
            });
        }
        for (index, name) in self.switches.iter().enumerate() {
            if names.insert(name.clone(), NodeRef::Switch(index)).is_some() {
                return Err(TopologyError::DuplicateName(name.clone()));
            }
            switches.push(Switch {
                name: name.clone(),
                ports: Vec::new(),
            });
        }

        let mut links = Vec::with_capacity(self.links.len());
        for spec in &self.links {
            if spec.a == spec.b {
                return Err(TopologyError::SelfLink(spec.a.clone()));
            }
            let a = *names
                .get(&spec.a)
                .ok_or_else(|| TopologyError::UnknownNode(spec.a.clone()))?;
            let b = *names
                .get(&spec.b)
                .ok_or_else(|| TopologyError::UnknownNode(spec.b.clone()))?;

            let a_index = self.attach(&mut hosts, &mut switches, a, spec.a_address)?;
            let b_index = self.attach(&mut hosts, &mut switches, b, spec.b_address)?;
            links.push(Link {
                a: (a, a_index),
                b: (b, b_index),
            });
        }

        log::debug!(
            "Built topology with {} hosts, {} switches and {} links",
            hosts.len(),
            switches.len(),
            links.len()
        );
        Ok(Topology {
            hosts,
            switches,
            links,
            names,
        })
    }

    /// Create the next interface on a node and return its index
    fn attach(
        &self,
        hosts: &mut [Host],
        switches: &mut [Switch],
        node: NodeRef,
        address_override: Option<Ipv4Net>,
    ) -> Result<usize, TopologyError> {
        let (owner, interfaces, address) = match node {
            NodeRef::Host(index) => {
                let host = &mut hosts[index];
                let address = match host.interfaces.len() {
                    0 => address_override.or(self.hosts[index].address),
                    _ => address_override,
                };
                (&host.name, &mut host.interfaces, address)
            }
            NodeRef::Switch(index) => {
                let switch = &mut switches[index];
                if address_override.is_some() {
                    return Err(TopologyError::AddressOnSwitch(switch.name.clone()));
                }
                (&switch.name, &mut switch.ports, None)
            }
        };

        let index = interfaces.len();
        let name = format!("{owner}-eth{index}");
        if name.len() > MAX_INTERFACE_NAME_LEN {
            return Err(TopologyError::InterfaceNameTooLong(name));
        }
        interfaces.push(Interface {
            name,
            index,
            address,
        });
        Ok(index)
    }
}

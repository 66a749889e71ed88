//! Utilities for operating on a link/interface/device

use std::fmt;

/// The kinds of virtual links that can be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// A WireGuard tunnel device
    Wireguard,
    /// A software bridge, used to emulate a switch
    Bridge,
    /// A veth pair, with the name of the peer end and the namespace it is created in.
    /// The peer lands next to the first end when `netns` is `None`
    Veth { peer: String, netns: Option<String> },
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Wireguard => write!(f, "type wireguard"),
            LinkKind::Bridge => write!(f, "type bridge"),
            LinkKind::Veth { peer, netns } => {
                write!(f, "type veth peer name {peer}")?;
                if let Some(netns) = netns {
                    write!(f, " netns {netns}")?;
                }
                Ok(())
            }
        }
    }
}

/// Create a new link
#[must_use]
pub fn link_add(device: &str, kind: &LinkKind) -> String {
    format!("ip link add {device} {kind}")
}

/// Create a new link directly inside a network namespace
#[must_use]
pub fn link_add_netns(device: &str, namespace: &str, kind: &LinkKind) -> String {
    format!("ip link add {device} netns {namespace} {kind}")
}

/// Delete a link
#[must_use]
pub fn link_del(device: &str) -> String {
    format!("ip link del {device}")
}

/// Bring up a link by name
#[must_use]
pub fn link_up(device: &str) -> String {
    format!("ip link set {device} up")
}

/// Attach a link to a bridge
#[must_use]
pub fn link_master(device: &str, bridge: &str) -> String {
    format!("ip link set {device} master {bridge}")
}

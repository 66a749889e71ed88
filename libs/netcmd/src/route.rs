//! Utilities for interacting with the routing table

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// Add a default route through a gateway
#[must_use]
pub fn default_via(gateway: Ipv4Addr) -> String {
    format!("ip route add default via {gateway}")
}

/// Add a route to a destination prefix through a gateway
#[must_use]
pub fn route_add(destination: Ipv4Net, gateway: Ipv4Addr) -> String {
    log::trace!("Rendering route {} via {}", destination, gateway);
    // `ip` rejects prefixes with host bits set
    format!("ip route add {} via {gateway}", destination.trunc())
}

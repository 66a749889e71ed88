//! Utilities for manipulating the addresses assigned to links

use ipnet::Ipv4Net;

/// Add an address to a link
#[must_use]
pub fn addr_add(address: Ipv4Net, device: &str) -> String {
    log::trace!("Rendering address {} for {}", address, device);
    format!("ip addr add {address} dev {device}")
}

//! Reachability probes

use std::net::Ipv4Addr;

/// Send a single ICMP echo request
#[must_use]
pub fn ping_once(target: Ipv4Addr) -> String {
    format!("ping -c1 {target}")
}

//! Utilities for building `iptables` NAT rules

use ipnet::Ipv4Net;

/// Masquerade outbound traffic.
///
/// `source` limits the rule to traffic originating from a prefix, and
/// `out_interface` limits it to traffic leaving through one interface.
#[must_use]
pub fn masquerade(source: Option<Ipv4Net>, out_interface: Option<&str>) -> String {
    let mut rule = String::from("iptables -t nat -A POSTROUTING");
    if let Some(source) = source {
        rule.push_str(&format!(" -s {}", source.trunc()));
    }
    if let Some(out_interface) = out_interface {
        rule.push_str(&format!(" -o {out_interface}"));
    }
    rule.push_str(" -j MASQUERADE");
    rule
}

/// Statically translate the destination of inbound traffic from one prefix to another.
///
/// Both prefixes should be the same size, host bits are kept as-is.
#[must_use]
pub fn netmap(destination: Ipv4Net, in_interface: &str, to: Ipv4Net) -> String {
    format!(
        "iptables -t nat -A PREROUTING -d {} -i {in_interface} -j NETMAP --to {}",
        destination.trunc(),
        to.trunc()
    )
}

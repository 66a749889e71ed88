//! Utilities for reading and writing kernel parameters

/// Kernel parameter controlling IPv4 forwarding between interfaces
pub const IP_FORWARD: &str = "net.ipv4.ip_forward";

/// Read a kernel parameter. Only the value is printed
#[must_use]
pub fn sysctl_get(key: &str) -> String {
    format!("sysctl -n {key}")
}

/// Write a kernel parameter
#[must_use]
pub fn sysctl_set(key: &str, value: &str) -> String {
    format!("sysctl -w {key}={value}")
}

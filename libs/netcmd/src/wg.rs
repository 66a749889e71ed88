//! Utilities for configuring WireGuard devices with `wg`

use std::{
    fmt,
    net::SocketAddrV4,
    path::{Path, PathBuf},
};

use ipnet::Ipv4Net;

use crate::quote::quote;

/// Argument vector that generates a new private key on stdout
pub const GENKEY: [&str; 2] = ["wg", "genkey"];

/// Argument vector that reads a private key on stdin and prints its public key
pub const PUBKEY: [&str; 2] = ["wg", "pubkey"];

/// A `wg set` invocation configuring a device with exactly one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    device: String,
    listen_port: u16,
    private_key_file: PathBuf,
    peer_public_key: String,
    allowed_ips: Vec<Ipv4Net>,
    endpoint: Option<SocketAddrV4>,
}

impl PeerConfig {
    /// Start a config for `device` listening on `listen_port`
    #[must_use]
    pub fn new(
        device: &str,
        listen_port: u16,
        private_key_file: &Path,
        peer_public_key: &str,
    ) -> Self {
        Self {
            device: device.to_owned(),
            listen_port,
            private_key_file: private_key_file.to_owned(),
            peer_public_key: peer_public_key.to_owned(),
            allowed_ips: Vec::new(),
            endpoint: None,
        }
    }

    /// Allow the peer to carry traffic for a prefix
    #[must_use]
    pub fn allow(mut self, prefix: Ipv4Net) -> Self {
        self.allowed_ips.push(prefix.trunc());
        self
    }

    /// Tell the device where the peer can initially be reached
    #[must_use]
    pub fn endpoint(mut self, endpoint: SocketAddrV4) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

impl fmt::Display for PeerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wg set {} listen-port {} private-key {} peer {}",
            self.device,
            self.listen_port,
            quote(&self.private_key_file.to_string_lossy()),
            quote(&self.peer_public_key)
        )?;
        if !self.allowed_ips.is_empty() {
            let allowed: Vec<String> = self.allowed_ips.iter().map(ToString::to_string).collect();
            write!(f, " allowed-ips {}", allowed.join(","))?;
        }
        if let Some(endpoint) = self.endpoint {
            write!(f, " endpoint {endpoint}")?;
        }
        Ok(())
    }
}

use std::{fmt, net::Ipv4Addr, str::FromStr};

use ipnet::Ipv4Net;

use crate::{cursor::AddressCursor, error::Error};

/// An IPv4 CIDR block that hands out CIDR-qualified host addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNetwork {
    /// The block itself, always stored with its host bits cleared
    net: Ipv4Net,
}

impl IpNetwork {
    /// Wrap a network. Any host bits set in `net` are dropped.
    #[must_use]
    pub fn new(net: Ipv4Net) -> Self {
        Self { net: net.trunc() }
    }

    /// The underlying network (eg. `10.100.10.0/28`)
    #[must_use]
    pub fn network(&self) -> Ipv4Net {
        self.net
    }

    /// Prefix length of the block
    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Total number of addresses in the block, including network and broadcast
    #[must_use]
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.net.prefix_len()))
    }

    /// Start a lazy cursor over the hosts of this block.
    ///
    /// `start` and `end` are inclusive offsets from the network address. When
    /// omitted they default to the first (`network + 1`) and last
    /// (`broadcast - 1`) usable host. `Some(0)` or `Some(size - 1)` reach the
    /// network or broadcast address on purpose.
    pub fn iter_hosts(&self, start: Option<u32>, end: Option<u32>) -> Result<AddressCursor, Error> {
        let last_offset = self.size() - 1;
        for offset in [start, end].into_iter().flatten() {
            if u64::from(offset) > last_offset {
                return Err(Error::OffsetOutOfRange {
                    network: self.net,
                    offset,
                    size: self.size(),
                });
            }
        }

        // Blocks without usable hosts (/31, /32) simply produce an empty cursor
        let first = start.map_or(1, u64::from);
        let last = end.map_or(last_offset.saturating_sub(1), u64::from);
        log::trace!("New cursor over {} covering offsets {}..={}", self.net, first, last);

        Ok(AddressCursor::new(*self, first, last))
    }

    /// Look up the `k`-th address of the block without touching any cursor
    pub fn index(&self, k: u32) -> Result<Ipv4Net, Error> {
        if u64::from(k) >= self.size() {
            return Err(Error::IndexOutOfRange {
                network: self.net,
                index: k,
                size: self.size(),
            });
        }
        Ok(self.host_at(u64::from(k)))
    }

    /// Build the CIDR-qualified address at an offset already known to be in range
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn host_at(&self, offset: u64) -> Ipv4Net {
        let addr = Ipv4Addr::from(u32::from(self.net.network()) + offset as u32);
        Ipv4Net::new(addr, self.net.prefix_len()).expect("prefix length taken from a valid network")
    }
}

impl From<Ipv4Net> for IpNetwork {
    fn from(net: Ipv4Net) -> Self {
        Self::new(net)
    }
}

impl FromStr for IpNetwork {
    type Err = ipnet::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.parse()?))
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.net, f)
    }
}

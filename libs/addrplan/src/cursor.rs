use std::iter::FusedIterator;

use ipnet::Ipv4Net;

use crate::{error::Error, network::IpNetwork};

/// A one-way cursor over a range of host addresses.
///
/// Cursors are deliberately not `Clone`: two copies of the same cursor would
/// hand out the same addresses twice.
#[derive(Debug)]
pub struct AddressCursor {
    /// Block the addresses are drawn from
    network: IpNetwork,
    /// Offset of the next address to hand out
    next: u64,
    /// Offset of the last address this cursor may hand out (inclusive)
    end: u64,
}

impl AddressCursor {
    pub(crate) fn new(network: IpNetwork, next: u64, end: u64) -> Self {
        Self { network, next, end }
    }

    /// Take the next address and advance the cursor
    pub fn pull(&mut self) -> Result<Ipv4Net, Error> {
        if self.next > self.end {
            return Err(Error::AllocationExhausted {
                network: self.network.network(),
                end: self.end,
            });
        }

        let addr = self.network.host_at(self.next);
        self.next += 1;
        log::trace!("Allocated {} from {}", addr, self.network);
        Ok(addr)
    }

    /// Number of addresses this cursor can still hand out
    #[must_use]
    pub fn remaining(&self) -> u64 {
        (self.end + 1).saturating_sub(self.next)
    }

    /// The block this cursor draws from
    #[must_use]
    pub fn network(&self) -> IpNetwork {
        self.network
    }
}

impl Iterator for AddressCursor {
    type Item = Ipv4Net;

    fn next(&mut self) -> Option<Self::Item> {
        self.pull().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl FusedIterator for AddressCursor {}

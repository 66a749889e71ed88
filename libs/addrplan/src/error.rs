//! Error types for this library

use ipnet::Ipv4Net;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("No addresses left in {network}. Offset {end} was the last one in range")]
    AllocationExhausted { network: Ipv4Net, end: u64 },
    #[error("Offset {offset} is outside of {network} ({size} addresses)")]
    OffsetOutOfRange {
        network: Ipv4Net,
        offset: u32,
        size: u64,
    },
    #[error("Index {index} is outside of {network} ({size} addresses)")]
    IndexOutOfRange {
        network: Ipv4Net,
        index: u32,
        size: u64,
    },
}

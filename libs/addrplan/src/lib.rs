#![doc = include_str!("../README.md")]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod cursor;
mod error;
mod network;
pub use cursor::AddressCursor;
pub use error::Error;
pub use network::IpNetwork;

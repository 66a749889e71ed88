#![doc = include_str!("../README.md")]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod ip;
pub mod link;
pub mod nat;
pub mod netns;
pub mod probe;
pub mod quote;
pub mod route;
pub mod sysctl;
pub mod wg;

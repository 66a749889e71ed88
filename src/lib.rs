//! # labnet library
//!
//! *Note: There is a fair chance you are looking for `src/labnet.rs` instead of this file.*

#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod command;
pub mod config;
pub mod emulator;
pub mod orchestrator;
pub mod scenarios;
pub mod session;
pub mod shell;
pub mod topology;

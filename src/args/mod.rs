//! This module contains the definitions for the binary's CLI arguments for the sake of readability.

pub mod labnet;

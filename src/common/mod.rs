//! Common code used by the labnet binary

pub mod logging;
pub mod permissions;

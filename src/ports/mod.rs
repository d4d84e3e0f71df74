//! Port traits the domain depends on.

pub mod config_port;
pub mod diagnostic_port;
pub mod trade_source_port;

//! Core domain types and logic.
//!
//! Loading and validation, the trade store and its edit history, analytics,
//! the query pipeline and the session state machine. Nothing here performs
//! I/O; sources and sinks come in through [`crate::ports`].

pub mod error;
pub mod trade;
pub mod loader;
pub mod store;
pub mod history;
pub mod position;
pub mod aggregate;
pub mod summary;
pub mod query;
pub mod session;
pub mod command_parser;
pub mod config;
pub mod config_validation;

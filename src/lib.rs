//! trade-analyzer: load executed trades, derive positions and P&L, and browse
//! them through a filter/sort/page session.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`engine`] ties them into a
//! session; [`cli`] is the command-line front end.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod engine;
pub mod cli;

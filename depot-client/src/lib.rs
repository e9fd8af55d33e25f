//! Depot Client Library
//!
//! Async client for the Depot file service and helpers used by the `depot`
//! command-line tool.

pub mod constants;
mod client;
mod error;
pub mod listing;

pub use client::DepotClient;
pub use error::ClientError;

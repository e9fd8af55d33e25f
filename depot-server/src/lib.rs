//! Depot Server Library
//!
//! Bounded-concurrency file service: uploads and downloads streamed in
//! chunks, plus listing, over a flat file store.

pub mod admission;
pub mod catalog;
pub mod connection;
pub mod constants;
pub mod context;
pub mod error;
pub mod logging;
pub mod server;
pub mod service;
pub mod store;
pub mod transfers;

pub use context::{CallContext, Shutdown};
pub use error::CallError;
pub use server::{ServerConfig, serve};
pub use service::{FileService, ServiceConfig};
pub use store::FileStore;

//! HTTP client for the central verification backend.
//!
//! Owns retry classification at the transport boundary: every failure that
//! crosses back into the sync engine arrives already labelled transient or
//! permanent.

mod client;
mod config;
mod error;
mod reachability;

pub use client::HttpRemoteSyncClient;
pub use config::RemoteConfig;
pub use error::{RemoteApiError, Result};
pub use reachability::HttpReachabilityProbe;

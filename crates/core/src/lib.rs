//! Domain models, contracts and the offline sync engine for the field
//! verification client.
//!
//! Storage and network implementations live in sibling crates
//! (`fieldmark-storage-sqlite`, `fieldmark-remote-sync`); everything here is
//! expressed against the traits they implement.

pub mod activity;
pub mod candidates;
pub mod captures;
pub mod errors;
pub mod sync;

pub use errors::{DatabaseError, Error, Result};

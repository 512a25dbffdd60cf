//! SQLite persistence for the field verification client.
//!
//! Implements the repository contracts from `fieldmark-core` on top of
//! diesel with an r2d2 read pool and a single serialized write actor.

pub mod activity;
pub mod candidates;
pub mod captures;
pub mod db;
pub mod errors;
pub mod schema;
pub mod sync;

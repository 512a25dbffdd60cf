//! Offline-first durable sync: outbox model, engine and scheduler.

mod engine;
mod outbox_model;
mod reachability;
mod remote_client;
mod scheduler;

pub use engine::*;
pub use outbox_model::*;
pub use reachability::*;
pub use remote_client::*;
pub use scheduler::*;

#[cfg(test)]
mod tests;

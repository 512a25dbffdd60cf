//! SQLite persistence for the durable sync outbox and engine bookkeeping.

mod model;
mod repository;

pub use model::{SyncEngineStateDB, SyncOutboxItemDB};
pub use repository::{write_outbox_item, OutboxWriteRequest, SqliteOutboxStore};

pub(crate) use repository::{enum_from_db, enum_to_db};

//! SQLite persistence for the append-only activity log.

mod model;
mod repository;

pub use model::{ActivityLogEntryDB, NewActivityLogEntryDB};
pub use repository::ActivityLogRepository;

pub(crate) use repository::write_activity_entry;

//! Database models for the activity log table.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use fieldmark_core::activity::ActivityLogEntry;

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::activity_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActivityLogEntryDB {
    pub id: i64,
    pub action: String,
    pub details: String,
    pub actor_id: String,
    pub timestamp: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::activity_log)]
pub struct NewActivityLogEntryDB {
    pub action: String,
    pub details: String,
    pub actor_id: String,
    pub timestamp: String,
}

impl From<ActivityLogEntryDB> for ActivityLogEntry {
    fn from(row: ActivityLogEntryDB) -> Self {
        ActivityLogEntry {
            id: row.id,
            action: row.action,
            details: row.details,
            actor_id: row.actor_id,
            timestamp: row.timestamp,
        }
    }
}

//! Database models for the sync outbox and engine state tables.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_outbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncOutboxItemDB {
    pub id: String,
    pub kind: String,
    pub payload: String,
    pub created_at: String,
    pub retry_count: i32,
    pub next_retry_at: Option<String>,
    pub state: String,
    pub last_error: Option<String>,
    pub last_error_class: Option<String>,
    pub abandoned_at: Option<String>,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_engine_state)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SyncEngineStateDB {
    pub id: i32,
    pub last_sync_at: Option<String>,
    pub last_error: Option<String>,
    pub last_cycle_status: Option<String>,
    pub last_cycle_duration_ms: Option<i64>,
    pub consecutive_failures: i32,
}

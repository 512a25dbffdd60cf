//! Durable outbox repository backing the sync engine.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use fieldmark_core::errors::{DatabaseError, Error, Result};
use fieldmark_core::sync::{
    OutboxStore, PendingSyncItem, SyncEngineState, SyncItemKind, SyncItemState,
};

use super::model::{SyncEngineStateDB, SyncOutboxItemDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{sync_engine_state, sync_outbox};

pub(crate) fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

/// Outcome label recorded for a fully successful cycle.
const CYCLE_STATUS_OK: &str = "ok";

/// An outbox row to be written in the same transaction as its domain
/// mutation. The item id doubles as the remote idempotency key; callers
/// normally leave it unset and let a UUIDv7 be assigned.
#[derive(Debug, Clone)]
pub struct OutboxWriteRequest {
    pub item_id: Option<String>,
    pub kind: SyncItemKind,
    pub payload: serde_json::Value,
}

impl OutboxWriteRequest {
    pub fn new(kind: SyncItemKind, payload: serde_json::Value) -> Self {
        Self {
            item_id: None,
            kind,
            payload,
        }
    }
}

/// Inserts a pending outbox row on the caller's connection, so the enqueue
/// shares the transaction of the mutation that produced it. Returns the
/// item id.
pub fn write_outbox_item(
    conn: &mut SqliteConnection,
    request: OutboxWriteRequest,
) -> Result<String> {
    let item_id = request
        .item_id
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let row = SyncOutboxItemDB {
        id: item_id.clone(),
        kind: enum_to_db(&request.kind)?,
        payload: serde_json::to_string(&request.payload)?,
        created_at: Utc::now().to_rfc3339(),
        retry_count: 0,
        next_retry_at: None,
        state: enum_to_db(&SyncItemState::Pending)?,
        last_error: None,
        last_error_class: None,
        abandoned_at: None,
    };

    diesel::insert_into(sync_outbox::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;

    Ok(item_id)
}

fn to_pending_item(row: SyncOutboxItemDB) -> Result<PendingSyncItem> {
    Ok(PendingSyncItem {
        id: row.id,
        kind: enum_from_db(&row.kind)?,
        payload: row.payload,
        created_at: row.created_at,
        retry_count: row.retry_count,
        next_retry_at: row.next_retry_at,
        state: enum_from_db(&row.state)?,
        last_error: row.last_error,
        last_error_class: row.last_error_class,
        abandoned_at: row.abandoned_at,
    })
}

pub struct SqliteOutboxStore {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SqliteOutboxStore {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl OutboxStore for SqliteOutboxStore {
    fn list_pending(&self, limit: i64) -> Result<Vec<PendingSyncItem>> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().to_rfc3339();

        let rows = sync_outbox::table
            .filter(sync_outbox::state.eq(enum_to_db(&SyncItemState::Pending)?))
            .filter(
                sync_outbox::next_retry_at
                    .is_null()
                    .or(sync_outbox::next_retry_at.le(now)),
            )
            .order((sync_outbox::created_at.asc(), sync_outbox::id.asc()))
            .limit(limit)
            .load::<SyncOutboxItemDB>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter().map(to_pending_item).collect()
    }

    async fn mark_synced(&self, item_id: String) -> Result<()> {
        self.writer
            .exec(move |conn| {
                // Idempotent: deleting an already-removed row affects 0 rows.
                diesel::delete(sync_outbox::table.find(item_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn increment_retry(
        &self,
        item_id: String,
        next_retry_at: String,
        error: String,
        error_class: String,
    ) -> Result<i32> {
        self.writer
            .exec(move |conn| {
                let row = sync_outbox::table
                    .find(&item_id)
                    .first::<SyncOutboxItemDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| {
                        Error::Database(DatabaseError::QueryFailed(format!(
                            "Outbox item '{}' not found",
                            item_id
                        )))
                    })?;

                let new_count = row.retry_count + 1;
                diesel::update(sync_outbox::table.find(&item_id))
                    .set((
                        sync_outbox::retry_count.eq(new_count),
                        sync_outbox::next_retry_at.eq(Some(next_retry_at)),
                        sync_outbox::last_error.eq(Some(error)),
                        sync_outbox::last_error_class.eq(Some(error_class)),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                Ok(new_count)
            })
            .await
    }

    async fn mark_abandoned(
        &self,
        item_id: String,
        error: String,
        error_class: String,
    ) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::update(sync_outbox::table.find(item_id))
                    .set((
                        sync_outbox::state.eq(enum_to_db(&SyncItemState::Abandoned)?),
                        sync_outbox::abandoned_at.eq(Some(Utc::now().to_rfc3339())),
                        sync_outbox::next_retry_at.eq::<Option<String>>(None),
                        sync_outbox::last_error.eq(Some(error)),
                        sync_outbox::last_error_class.eq(Some(error_class)),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn requeue_abandoned(&self, item_id: String) -> Result<()> {
        self.writer
            .exec(move |conn| {
                // Last error fields stay as history for the operator view.
                diesel::update(
                    sync_outbox::table
                        .find(item_id)
                        .filter(sync_outbox::state.eq(enum_to_db(&SyncItemState::Abandoned)?)),
                )
                .set((
                    sync_outbox::state.eq(enum_to_db(&SyncItemState::Pending)?),
                    sync_outbox::retry_count.eq(0),
                    sync_outbox::next_retry_at.eq::<Option<String>>(None),
                    sync_outbox::abandoned_at.eq::<Option<String>>(None),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn pending_count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = sync_outbox::table
            .filter(sync_outbox::state.eq(enum_to_db(&SyncItemState::Pending)?))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    fn abandoned_count(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = sync_outbox::table
            .filter(sync_outbox::state.eq(enum_to_db(&SyncItemState::Abandoned)?))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    fn list_abandoned(&self, limit: i64) -> Result<Vec<PendingSyncItem>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_outbox::table
            .filter(sync_outbox::state.eq(enum_to_db(&SyncItemState::Abandoned)?))
            .order(sync_outbox::abandoned_at.desc())
            .limit(limit)
            .load::<SyncOutboxItemDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_pending_item).collect()
    }

    async fn record_cycle_outcome(
        &self,
        status: String,
        duration_ms: i64,
        error: Option<String>,
    ) -> Result<()> {
        self.writer
            .exec(move |conn| {
                let existing = sync_engine_state::table
                    .find(1)
                    .first::<SyncEngineStateDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;

                let succeeded = status == CYCLE_STATUS_OK;
                let now = Utc::now().to_rfc3339();
                let row = SyncEngineStateDB {
                    id: 1,
                    last_sync_at: if succeeded {
                        Some(now)
                    } else {
                        existing.as_ref().and_then(|s| s.last_sync_at.clone())
                    },
                    last_error: if succeeded { None } else { error },
                    last_cycle_status: Some(status),
                    last_cycle_duration_ms: Some(duration_ms),
                    consecutive_failures: if succeeded {
                        0
                    } else {
                        existing.map(|s| s.consecutive_failures).unwrap_or(0) + 1
                    },
                };

                diesel::insert_into(sync_engine_state::table)
                    .values(&row)
                    .on_conflict(sync_engine_state::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn get_engine_state(&self) -> Result<SyncEngineState> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_engine_state::table
            .find(1)
            .first::<SyncEngineStateDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;

        Ok(row
            .map(|s| SyncEngineState {
                last_sync_at: s.last_sync_at,
                last_error: s.last_error,
                last_cycle_status: s.last_cycle_status,
                last_cycle_duration_ms: s.last_cycle_duration_ms,
                consecutive_failures: s.consecutive_failures,
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::db::{create_pool, get_connection, init, run_migrations, write_actor::spawn_writer};

    fn setup_db() -> (
        Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        WriteHandle,
    ) {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        (pool, writer)
    }

    fn insert_candidate_for_test(conn: &mut SqliteConnection, candidate_id: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO candidates (id, roll_number, full_name, centre_id, attendance_status, created_at, updated_at) VALUES ('{}', 'R-001', 'Test Candidate', 'CTR-1', 'not_marked', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            candidate_id
        );
        diesel::sql_query(sql)
            .execute(conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn attendance_value(candidate_id: &str) -> serde_json::Value {
        serde_json::json!({
            "candidateId": candidate_id,
            "centreId": "CTR-1",
            "method": "manual",
            "markedAt": Utc::now().to_rfc3339(),
        })
    }

    async fn enqueue(writer: &WriteHandle, candidate_id: &str) -> String {
        let payload = attendance_value(candidate_id);
        writer
            .exec(move |conn| {
                write_outbox_item(conn, OutboxWriteRequest::new(SyncItemKind::Attendance, payload))
            })
            .await
            .expect("enqueue")
    }

    #[tokio::test]
    async fn creates_schema_tables() {
        let (pool, _writer) = setup_db();
        let mut conn = get_connection(&pool).expect("conn");
        for table in [
            "candidates",
            "biometric_captures",
            "sync_outbox",
            "activity_log",
            "sync_engine_state",
        ] {
            let sql = format!(
                "SELECT COUNT(*) as c FROM sqlite_master WHERE type='table' AND name='{}'",
                table
            );
            #[derive(diesel::QueryableByName)]
            struct CountRow {
                #[diesel(sql_type = diesel::sql_types::BigInt)]
                c: i64,
            }
            let row = diesel::sql_query(sql)
                .get_result::<CountRow>(&mut conn)
                .expect("table exists");
            assert_eq!(row.c, 1, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn outbox_write_rollback_keeps_mutation_atomic() {
        let (pool, writer) = setup_db();

        let tx_result = writer
            .exec(|conn| {
                insert_candidate_for_test(conn, "cand-rollback")?;

                let mut req =
                    OutboxWriteRequest::new(SyncItemKind::Attendance, attendance_value("cand-rollback"));
                req.item_id = Some("fixed-item-id".to_string());
                write_outbox_item(conn, req.clone())?;
                let _ = write_outbox_item(conn, req)?;
                Ok(())
            })
            .await;

        assert!(tx_result.is_err(), "expected duplicate outbox id failure");

        let mut conn = get_connection(&pool).expect("conn");
        let candidate_count: i64 = crate::schema::candidates::table
            .filter(crate::schema::candidates::id.eq("cand-rollback"))
            .count()
            .get_result(&mut conn)
            .expect("count");
        assert_eq!(candidate_count, 0, "candidate insert should be rolled back");
    }

    #[tokio::test]
    async fn lists_pending_oldest_first_excluding_deferred_items() {
        let (pool, writer) = setup_db();
        let store = SqliteOutboxStore::new(pool, writer.clone());

        let first = enqueue(&writer, "cand-1").await;
        let second = enqueue(&writer, "cand-2").await;
        let deferred = enqueue(&writer, "cand-3").await;

        let far_future = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        store
            .increment_retry(deferred.clone(), far_future, "timeout".into(), "transient".into())
            .await
            .expect("defer");

        let listed = store.list_pending(50).expect("list");
        let ids = listed.iter().map(|i| i.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(store.pending_count().expect("count"), 3);
    }

    #[tokio::test]
    async fn mark_synced_deletes_and_is_idempotent() {
        let (pool, writer) = setup_db();
        let store = SqliteOutboxStore::new(pool, writer.clone());
        let id = enqueue(&writer, "cand-1").await;

        store.mark_synced(id.clone()).await.expect("first delete");
        store.mark_synced(id).await.expect("second delete is ok");
        assert_eq!(store.pending_count().expect("count"), 0);
    }

    #[tokio::test]
    async fn increment_retry_stamps_backoff_and_diagnostics() {
        let (pool, writer) = setup_db();
        let store = SqliteOutboxStore::new(pool, writer.clone());
        let id = enqueue(&writer, "cand-1").await;

        let retry_at = (Utc::now() + chrono::Duration::seconds(30)).to_rfc3339();
        let count = store
            .increment_retry(id, retry_at.clone(), "HTTP 503".into(), "transient".into())
            .await
            .expect("increment");
        assert_eq!(count, 1);

        // Deferred item is invisible until its deadline passes.
        assert!(store.list_pending(50).expect("list").is_empty());

        let item = {
            let more = store.list_abandoned(50).expect("abandoned");
            assert!(more.is_empty());
            store.pending_count().expect("count")
        };
        assert_eq!(item, 1);
    }

    #[tokio::test]
    async fn abandon_requeue_round_trip() {
        let (pool, writer) = setup_db();
        let store = SqliteOutboxStore::new(pool, writer.clone());
        let id = enqueue(&writer, "cand-1").await;

        store
            .mark_abandoned(id.clone(), "HTTP 422".into(), "permanent".into())
            .await
            .expect("abandon");

        assert_eq!(store.pending_count().expect("pending"), 0);
        assert_eq!(store.abandoned_count().expect("abandoned"), 1);

        let quarantined = store.list_abandoned(50).expect("list");
        assert_eq!(quarantined.len(), 1);
        assert_eq!(quarantined[0].state, SyncItemState::Abandoned);
        assert_eq!(quarantined[0].last_error_class.as_deref(), Some("permanent"));
        assert!(quarantined[0].abandoned_at.is_some());

        store.requeue_abandoned(id.clone()).await.expect("requeue");
        let restored = store.list_pending(50).expect("list");
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].id, id);
        assert_eq!(restored[0].retry_count, 0);
        assert!(restored[0].next_retry_at.is_none());
    }

    #[tokio::test]
    async fn cycle_outcomes_track_engine_state() {
        let (pool, writer) = setup_db();
        let store = SqliteOutboxStore::new(pool, writer);

        store
            .record_cycle_outcome("storage_error".into(), 12, Some("disk full".into()))
            .await
            .expect("record error");
        let state = store.get_engine_state().expect("state");
        assert!(state.last_sync_at.is_none());
        assert_eq!(state.last_error.as_deref(), Some("disk full"));
        assert_eq!(state.consecutive_failures, 1);

        store
            .record_cycle_outcome("ok".into(), 34, None)
            .await
            .expect("record ok");
        let state = store.get_engine_state().expect("state");
        assert!(state.last_sync_at.is_some());
        assert!(state.last_error.is_none());
        assert_eq!(state.last_cycle_status.as_deref(), Some("ok"));
        assert_eq!(state.last_cycle_duration_ms, Some(34));
        assert_eq!(state.consecutive_failures, 0);
    }
}

use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use fieldmark_core::activity::{ActivityLogEntry, ActivityLogRepositoryTrait, NewActivityLogEntry};
use fieldmark_core::errors::Result;

use super::model::{ActivityLogEntryDB, NewActivityLogEntryDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::activity_log;

/// Appends an entry on the caller's connection so an audit write can share
/// the transaction of the mutation it documents.
pub(crate) fn write_activity_entry(
    conn: &mut SqliteConnection,
    action: &str,
    details: String,
    actor_id: String,
) -> Result<()> {
    let row = NewActivityLogEntryDB {
        action: action.to_string(),
        details,
        actor_id,
        timestamp: Utc::now().to_rfc3339(),
    };
    diesel::insert_into(activity_log::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

pub struct ActivityLogRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ActivityLogRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ActivityLogRepositoryTrait for ActivityLogRepository {
    async fn append(&self, entry: NewActivityLogEntry) -> Result<()> {
        self.writer
            .exec(move |conn| {
                write_activity_entry(conn, &entry.action, entry.details, entry.actor_id)
            })
            .await
    }

    fn list_recent(&self, limit: i64) -> Result<Vec<ActivityLogEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = activity_log::table
            .order(activity_log::id.desc())
            .limit(limit)
            .load::<ActivityLogEntryDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(ActivityLogEntry::from).collect())
    }

    async fn purge_older_than(&self, retention_days: i64) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                let cutoff = (Utc::now() - Duration::days(retention_days)).to_rfc3339();
                let purged = diesel::delete(
                    activity_log::table.filter(activity_log::timestamp.lt(cutoff)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(purged)
            })
            .await
    }
}

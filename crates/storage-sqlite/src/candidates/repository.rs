use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use fieldmark_core::candidates::{
    AttendanceMethod, AttendanceStatus, Candidate, CandidateRepositoryTrait, NewCandidate,
    VerificationOutcome,
};
use fieldmark_core::errors::{DatabaseError, Error, Result};
use fieldmark_core::sync::{AttendancePayload, SyncItemKind, VerificationPayload};

use super::model::{to_candidate, CandidateDB, NewCandidateDB};
use crate::activity::write_activity_entry;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::candidates;
use crate::sync::{enum_to_db, write_outbox_item, OutboxWriteRequest};

fn load_candidate(conn: &mut SqliteConnection, candidate_id: &str) -> Result<CandidateDB> {
    candidates::table
        .find(candidate_id)
        .first::<CandidateDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Candidate '{}' not found",
                candidate_id
            )))
        })
}

pub struct CandidateRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl CandidateRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl CandidateRepositoryTrait for CandidateRepository {
    fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>> {
        let mut conn = get_connection(&self.pool)?;
        let row = candidates::table
            .find(candidate_id)
            .first::<CandidateDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(to_candidate).transpose()
    }

    fn search_candidates(&self, query: &str, limit: i64) -> Result<Vec<Candidate>> {
        let mut conn = get_connection(&self.pool)?;
        let pattern = format!("%{}%", query);
        let rows = candidates::table
            .filter(
                candidates::roll_number
                    .like(pattern.clone())
                    .or(candidates::full_name.like(pattern)),
            )
            .order(candidates::roll_number.asc())
            .limit(limit)
            .load::<CandidateDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_candidate).collect()
    }

    async fn insert_candidates(&self, new_candidates: Vec<NewCandidate>) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                let now = Utc::now().to_rfc3339();
                let mut inserted = 0;
                for candidate in new_candidates {
                    let row = NewCandidateDB {
                        id: Uuid::new_v4().to_string(),
                        roll_number: candidate.roll_number,
                        full_name: candidate.full_name,
                        centre_id: candidate.centre_id,
                        attendance_status: enum_to_db(&AttendanceStatus::NotMarked)?,
                        created_at: now.clone(),
                        updated_at: now.clone(),
                    };
                    inserted += diesel::insert_into(candidates::table)
                        .values(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await
    }

    async fn mark_attendance(
        &self,
        candidate_id: String,
        method: AttendanceMethod,
        actor_id: String,
    ) -> Result<String> {
        self.writer
            .exec(move |conn| {
                let candidate = load_candidate(conn, &candidate_id)?;
                let now = Utc::now().to_rfc3339();

                diesel::update(candidates::table.find(&candidate_id))
                    .set((
                        candidates::attendance_status.eq(enum_to_db(&AttendanceStatus::Present)?),
                        candidates::attendance_marked_at.eq(Some(now.clone())),
                        candidates::updated_at.eq(now.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let payload = AttendancePayload {
                    candidate_id: candidate_id.clone(),
                    centre_id: candidate.centre_id,
                    method,
                    marked_at: now,
                };
                let item_id = write_outbox_item(
                    conn,
                    OutboxWriteRequest::new(
                        SyncItemKind::Attendance,
                        serde_json::to_value(&payload)?,
                    ),
                )?;

                write_activity_entry(
                    conn,
                    "attendance.marked",
                    serde_json::json!({
                        "candidateId": candidate_id,
                        "method": payload.method,
                        "itemId": item_id,
                    })
                    .to_string(),
                    actor_id,
                )?;

                Ok(item_id)
            })
            .await
    }

    async fn record_verification(
        &self,
        candidate_id: String,
        outcome: VerificationOutcome,
        score: Option<f64>,
        provider_ref: Option<String>,
        actor_id: String,
    ) -> Result<String> {
        self.writer
            .exec(move |conn| {
                // Existence check keeps the enqueue honest for unknown ids.
                load_candidate(conn, &candidate_id)?;
                let now = Utc::now().to_rfc3339();

                diesel::update(candidates::table.find(&candidate_id))
                    .set((
                        candidates::verification_status.eq(Some(enum_to_db(&outcome)?)),
                        candidates::verification_score.eq(score),
                        candidates::updated_at.eq(now.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let payload = VerificationPayload {
                    candidate_id: candidate_id.clone(),
                    outcome,
                    score,
                    provider_ref,
                    verified_at: now,
                };
                let item_id = write_outbox_item(
                    conn,
                    OutboxWriteRequest::new(
                        SyncItemKind::Verification,
                        serde_json::to_value(&payload)?,
                    ),
                )?;

                write_activity_entry(
                    conn,
                    "verification.recorded",
                    serde_json::json!({
                        "candidateId": candidate_id,
                        "outcome": payload.outcome,
                        "itemId": item_id,
                    })
                    .to_string(),
                    actor_id,
                )?;

                Ok(item_id)
            })
            .await
    }
}

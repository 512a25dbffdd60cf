use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use fieldmark_core::captures::{
    BiometricCapture, BiometricCaptureRepositoryTrait, NewBiometricCapture,
};
use fieldmark_core::errors::Result;
use fieldmark_core::sync::{BiometricPayload, SyncItemKind};

use super::model::{to_capture, BiometricCaptureDB, NewBiometricCaptureDB};
use crate::activity::write_activity_entry;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::biometric_captures;
use crate::sync::{enum_to_db, write_outbox_item, OutboxWriteRequest};

pub struct BiometricCaptureRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl BiometricCaptureRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl BiometricCaptureRepositoryTrait for BiometricCaptureRepository {
    fn list_captures_for_candidate(&self, candidate_id: &str) -> Result<Vec<BiometricCapture>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = biometric_captures::table
            .filter(biometric_captures::candidate_id.eq(candidate_id))
            .order(biometric_captures::captured_at.asc())
            .load::<BiometricCaptureDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_capture).collect()
    }

    async fn save_capture(
        &self,
        capture: NewBiometricCapture,
        actor_id: String,
    ) -> Result<String> {
        self.writer
            .exec(move |conn| {
                let capture_id = Uuid::new_v4().to_string();
                let row = NewBiometricCaptureDB {
                    id: capture_id.clone(),
                    candidate_id: capture.candidate_id.clone(),
                    modality: enum_to_db(&capture.modality)?,
                    content_ref: capture.content_ref.clone(),
                    content_sha256: capture.content_sha256.clone(),
                    captured_at: capture.captured_at.clone(),
                    created_at: Utc::now().to_rfc3339(),
                };
                diesel::insert_into(biometric_captures::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let payload = BiometricPayload {
                    capture_id: capture_id.clone(),
                    candidate_id: capture.candidate_id.clone(),
                    modality: capture.modality,
                    content_ref: capture.content_ref,
                    content_sha256: capture.content_sha256,
                    captured_at: capture.captured_at,
                };
                let item_id = write_outbox_item(
                    conn,
                    OutboxWriteRequest::new(
                        SyncItemKind::Biometric,
                        serde_json::to_value(&payload)?,
                    ),
                )?;

                write_activity_entry(
                    conn,
                    "capture.saved",
                    serde_json::json!({
                        "captureId": capture_id,
                        "candidateId": capture.candidate_id,
                        "modality": payload.modality,
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use fieldmark_core::candidates::NewCandidate;
    use fieldmark_core::candidates::CandidateRepositoryTrait;
    use fieldmark_core::captures::CaptureModality;
    use fieldmark_core::sync::{OutboxStore, SyncItemState};

    use crate::candidates::CandidateRepository;
    use crate::db::{create_pool, init, run_migrations, write_actor::spawn_writer};
    use crate::sync::SqliteOutboxStore;

    struct Fixture {
        candidates: CandidateRepository,
        captures: BiometricCaptureRepository,
        outbox: SqliteOutboxStore,
    }

    fn setup() -> Fixture {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        Fixture {
            candidates: CandidateRepository::new(pool.clone(), writer.clone()),
            captures: BiometricCaptureRepository::new(pool.clone(), writer.clone()),
            outbox: SqliteOutboxStore::new(pool, writer),
        }
    }

    async fn seed_candidate(fixture: &Fixture) -> String {
        fixture
            .candidates
            .insert_candidates(vec![NewCandidate {
                roll_number: "R-3001".to_string(),
                full_name: "Deepak Nair".to_string(),
                centre_id: "CTR-9".to_string(),
            }])
            .await
            .expect("insert");
        fixture.candidates.search_candidates("R-3001", 1).expect("search")[0]
            .id
            .clone()
    }

    fn new_capture(candidate_id: &str) -> NewBiometricCapture {
        NewBiometricCapture {
            candidate_id: candidate_id.to_string(),
            modality: CaptureModality::Face,
            content_ref: "media/face-001.jpg".to_string(),
            content_sha256: "ab".repeat(32),
            captured_at: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn save_capture_persists_row_and_enqueues_reference_payload() {
        let fixture = setup();
        let candidate_id = seed_candidate(&fixture).await;

        let item_id = fixture
            .captures
            .save_capture(new_capture(&candidate_id), "op-1".into())
            .await
            .expect("save capture");

        let stored = fixture
            .captures
            .list_captures_for_candidate(&candidate_id)
            .expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].modality, CaptureModality::Face);

        let pending = fixture.outbox.list_pending(10).expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, item_id);
        assert_eq!(pending[0].kind, SyncItemKind::Biometric);
        assert_eq!(pending[0].state, SyncItemState::Pending);

        let payload: BiometricPayload =
            serde_json::from_str(&pending[0].payload).expect("payload decodes");
        assert_eq!(payload.capture_id, stored[0].id);
        assert_eq!(payload.content_ref, "media/face-001.jpg");
    }

    #[tokio::test]
    async fn save_capture_for_unknown_candidate_rolls_back() {
        let fixture = setup();

        let result = fixture
            .captures
            .save_capture(new_capture("missing"), "op-1".into())
            .await;
        // Foreign key constraint fires inside the transaction.
        assert!(result.is_err());
        assert_eq!(fixture.outbox.pending_count().expect("count"), 0);
        assert!(fixture
            .captures
            .list_captures_for_candidate("missing")
            .expect("list")
            .is_empty());
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// How attendance was recorded at the centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceMethod {
    Manual,
    FaceMatch,
    Fingerprint,
}

/// Attendance lifecycle for a candidate on exam day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    NotMarked,
    Present,
    Absent,
}

/// Outcome reported by the remote verification provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Matched,
    NotMatched,
    Inconclusive,
}

/// Candidate registered at an examination centre.
///
/// Owned by the local store; the sync engine never deletes candidates, only
/// the enqueueing mutations update status fields in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub roll_number: String,
    pub full_name: String,
    pub centre_id: String,
    pub attendance_status: AttendanceStatus,
    pub attendance_marked_at: Option<String>,
    pub verification_status: Option<VerificationOutcome>,
    pub verification_score: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for registering a candidate locally (roster import).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCandidate {
    pub roll_number: String,
    pub full_name: String,
    pub centre_id: String,
}

/// Candidate persistence contract implemented by the SQLite store.
///
/// The mutating operations persist the domain change and the matching outbox
/// item in one transaction and return the enqueued item id.
#[async_trait]
pub trait CandidateRepositoryTrait: Send + Sync {
    fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>>;

    /// Roll-number and name search for the operator list screens.
    fn search_candidates(&self, query: &str, limit: i64) -> Result<Vec<Candidate>>;

    async fn insert_candidates(&self, candidates: Vec<NewCandidate>) -> Result<usize>;

    /// Mark attendance and enqueue the corresponding sync item atomically.
    async fn mark_attendance(
        &self,
        candidate_id: String,
        method: AttendanceMethod,
        actor_id: String,
    ) -> Result<String>;

    /// Record a verification outcome and enqueue its sync item atomically.
    async fn record_verification(
        &self,
        candidate_id: String,
        outcome: VerificationOutcome,
        score: Option<f64>,
        provider_ref: Option<String>,
        actor_id: String,
    ) -> Result<String>;
}

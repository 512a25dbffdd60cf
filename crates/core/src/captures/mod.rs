//! Biometric capture models and repository contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Capture modality supported by the field client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureModality {
    Face,
    Fingerprint,
    OmrSheet,
}

/// A biometric capture stored on-device until the backend acknowledges it.
///
/// `content_ref` points at the on-device media file; only the reference and
/// its checksum travel through the outbox payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricCapture {
    pub id: String,
    pub candidate_id: String,
    pub modality: CaptureModality,
    pub content_ref: String,
    pub content_sha256: String,
    pub captured_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBiometricCapture {
    pub candidate_id: String,
    pub modality: CaptureModality,
    pub content_ref: String,
    pub content_sha256: String,
    pub captured_at: String,
}

/// Capture persistence contract implemented by the SQLite store.
#[async_trait]
pub trait BiometricCaptureRepositoryTrait: Send + Sync {
    fn list_captures_for_candidate(&self, candidate_id: &str) -> Result<Vec<BiometricCapture>>;

    /// Persist the capture and enqueue its sync item atomically; returns the
    /// enqueued outbox item id.
    async fn save_capture(&self, capture: NewBiometricCapture, actor_id: String)
        -> Result<String>;
}

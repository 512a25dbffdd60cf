//! Remote submission contract consumed by the sync engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AttendancePayload, BiometricPayload, VerificationPayload};

/// Retry policy classification for remote failures.
///
/// Every error crossing the client boundary must carry a class; transports
/// that cannot classify a failure default to `Transient` (retrying is safer
/// than silently dropping operator work).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    Transient,
    Permanent,
}

impl RetryClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryClass::Transient => "transient",
            RetryClass::Permanent => "permanent",
        }
    }
}

/// A classified remote failure.
#[derive(Debug, Clone, Error)]
#[error("{class:?} remote error: {message}")]
pub struct RemoteError {
    pub class: RetryClass,
    pub message: String,
}

impl RemoteError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: RetryClass::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: RetryClass::Permanent,
            message: message.into(),
        }
    }
}

pub type RemoteResult = std::result::Result<(), RemoteError>;

/// One submission method per record kind.
///
/// `idempotency_key` is the outbox item id; the backend deduplicates on it,
/// so redelivery after a crash mid-flight is a server-side no-op.
#[async_trait]
pub trait RemoteSyncClient: Send + Sync {
    async fn submit_attendance(
        &self,
        idempotency_key: &str,
        payload: &AttendancePayload,
    ) -> RemoteResult;

    async fn submit_biometric(
        &self,
        idempotency_key: &str,
        payload: &BiometricPayload,
    ) -> RemoteResult;

    async fn submit_verification(
        &self,
        idempotency_key: &str,
        payload: &VerificationPayload,
    ) -> RemoteResult;
}

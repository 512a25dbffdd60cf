//! Database models for the biometric captures table.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use fieldmark_core::captures::BiometricCapture;
use fieldmark_core::errors::Result;

use crate::sync::enum_from_db;

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
#[diesel(table_name = crate::schema::biometric_captures)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BiometricCaptureDB {
    pub id: String,
    pub candidate_id: String,
    pub modality: String,
    pub content_ref: String,
    pub content_sha256: String,
    pub captured_at: String,
    pub created_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::biometric_captures)]
pub struct NewBiometricCaptureDB {
    pub id: String,
    pub candidate_id: String,
    pub modality: String,
    pub content_ref: String,
    pub content_sha256: String,
    pub captured_at: String,
    pub created_at: String,
}

pub(crate) fn to_capture(row: BiometricCaptureDB) -> Result<BiometricCapture> {
    Ok(BiometricCapture {
        id: row.id,
        candidate_id: row.candidate_id,
        modality: enum_from_db(&row.modality)?,
        content_ref: row.content_ref,
        content_sha256: row.content_sha256,
        captured_at: row.captured_at,
        created_at: row.created_at,
    })
}

//! Database models for the candidates table.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use fieldmark_core::candidates::Candidate;
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
#[diesel(table_name = crate::schema::candidates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CandidateDB {
    pub id: String,
    pub roll_number: String,
    pub full_name: String,
    pub centre_id: String,
    pub attendance_status: String,
    pub attendance_marked_at: Option<String>,
    pub verification_status: Option<String>,
    pub verification_score: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::candidates)]
pub struct NewCandidateDB {
    pub id: String,
    pub roll_number: String,
    pub full_name: String,
    pub centre_id: String,
    pub attendance_status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) fn to_candidate(row: CandidateDB) -> Result<Candidate> {
    Ok(Candidate {
        id: row.id,
        roll_number: row.roll_number,
        full_name: row.full_name,
        centre_id: row.centre_id,
        attendance_status: enum_from_db(&row.attendance_status)?,
        attendance_marked_at: row.attendance_marked_at,
        verification_status: row
            .verification_status
            .as_deref()
            .map(enum_from_db)
            .transpose()?,
        verification_score: row.verification_score,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

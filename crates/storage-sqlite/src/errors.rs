//! Storage-layer error type bridging diesel failures into the workspace
//! error taxonomy.

use thiserror::Error;

use fieldmark_core::errors::{DatabaseError, Error};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    /// Carries a domain error across a diesel transaction boundary so the
    /// original variant survives the round trip.
    #[error(transparent)]
    Domain(Error),
}

impl From<diesel::r2d2::PoolError> for StorageError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        StorageError::Pool(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Domain(inner) => inner,
            StorageError::Pool(message) => Error::Database(DatabaseError::Pool(message)),
            StorageError::Query(inner) => {
                Error::Database(DatabaseError::QueryFailed(inner.to_string()))
            }
            StorageError::Migration(message) => {
                Error::Database(DatabaseError::Internal(message))
            }
        }
    }
}

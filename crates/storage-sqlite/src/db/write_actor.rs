//! Single-writer actor serializing all mutations onto one connection.
//!
//! SQLite allows one writer at a time; funneling every write through a
//! dedicated thread avoids SQLITE_BUSY churn under concurrent enqueues and
//! drain cycles. Each job runs inside an immediate transaction, so a domain
//! mutation and its outbox row commit or roll back together.

use diesel::sqlite::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use fieldmark_core::errors::{DatabaseError, Error, Result};

use super::DbPool;
use crate::errors::StorageError;

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl WriteHandle {
    /// Runs `job` on the writer thread inside an immediate transaction and
    /// returns its result. An error rolls the whole transaction back.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<Result<T>>();
        let boxed: WriteJob = Box::new(move |conn| {
            let outcome = conn
                .immediate_transaction::<_, StorageError, _>(|tx| {
                    job(tx).map_err(StorageError::Domain)
                })
                .map_err(Error::from);
            let _ = reply_tx.send(outcome);
        });
        self.tx.send(boxed).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Write actor is no longer running".to_string(),
            ))
        })?;
        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Write actor dropped the job before replying".to_string(),
            ))
        })?
    }
}

pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
    std::thread::spawn(move || {
        while let Some(job) = rx.blocking_recv() {
            match pool.get() {
                Ok(mut conn) => job(&mut conn),
                // The caller's reply channel closes when the job is dropped.
                Err(e) => error!("[Storage] Write actor could not get a connection: {}", e),
            }
        }
    });
    WriteHandle { tx }
}

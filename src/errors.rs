//! The core error taxonomy (spec.md section 7), kept independent of
//! `loco_rs::Error` the way the teacher's `MediaError`
//! (`src/controllers/logic/setup.rs`) stays independent of it and is
//! converted at the controller boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad input (missing group, unsupported mime). Surfaced synchronously
    /// from ingest.
    #[error("validation error: {0}")]
    Validation(String),

    /// Retried within the worker; after exhaustion becomes a permanent
    /// `processing_error` recorded on the photo row.
    #[error("transient I/O error: {0}")]
    Transient(String),

    /// A worker tried to acquire another worker's group advisory lock and
    /// timed out waiting for it.
    #[error("group {group_id} is locked by another reconciliation")]
    Concurrency { group_id: i32 },

    /// Missing storage root, misconfigured KV, or similar: the worker
    /// should abort at startup.
    #[error("fatal configuration error: {0}")]
    Fatal(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<CoreError> for loco_rs::Error {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => loco_rs::Error::BadRequest(msg),
            CoreError::Concurrency { group_id } => loco_rs::Error::Message(format!(
                "group {group_id} is locked by another reconciliation"
            )),
            CoreError::Fatal(msg) => loco_rs::Error::Message(msg),
            CoreError::Transient(msg) => loco_rs::Error::Message(msg),
            CoreError::Database(e) => loco_rs::Error::DB(e),
        }
    }
}

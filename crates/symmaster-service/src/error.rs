use thiserror::Error;

use symmaster_core::{BatchRejected, HashCollisionError, ValidationError};

use crate::audit::AuditError;
use crate::repository::RepositoryError;

/// Terminal failures surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input rows; non-retriable, the caller must fix the batch.
    #[error(transparent)]
    Validation(#[from] BatchRejected),

    /// Temporal inconsistency detected while computing the diff.
    #[error("invalid batch: {0}")]
    Invalid(#[from] ValidationError),

    /// Batch predates current state; non-retriable without the force flag.
    #[error("stale update for {key}: submitted valid_from {submitted} precedes current {current}")]
    StaleUpdate {
        key: String,
        submitted: i64,
        current: i64,
    },

    /// Fatal identity collision; never silently resolved.
    #[error(transparent)]
    Collision(#[from] HashCollisionError),

    /// Optimistic write conflicted past the configured bound. Retriable by
    /// the caller at a higher level, never automatically here.
    #[error("optimistic write conflict persisted after {attempts} attempts")]
    ConflictExhausted { attempts: u32 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

//! Orchestration layer for the symmaster point-in-time symbol master.
//!
//! This crate contains:
//! - The `TableRepository` contract the core consumes (versioned snapshot
//!   reads, conditional writes) plus an in-memory reference implementation
//! - The structured audit sink and per-run audit record
//! - Bounded retry with backoff for optimistic write conflicts
//! - `ServiceOrchestrator`: the validate → deduplicate → diff →
//!   write-with-retry → audit lifecycle
//!
//! The domain logic itself lives in `symmaster-core`; everything here is
//! composition over injected collaborators.

pub mod audit;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod repository;
pub mod retry;

pub use audit::{AuditError, AuditRecord, AuditSink, MemoryAuditSink, RunOutcome};
pub use error::ServiceError;
pub use memory::InMemoryTable;
pub use orchestrator::{OrchestratorConfig, RunReport, ServiceOrchestrator};
pub use repository::{
    RepositoryError, TableRepository, TableSnapshot, VersionToken, WriteOutcome,
};
pub use retry::{Backoff, RetryConfig};

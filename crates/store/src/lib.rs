//! Ledger persistence and orchestration for RevLedger.
//!
//! This crate owns the append-only entry store, the posting service that
//! serializes writes per contract, the audit trail, and the period
//! consolidation job. All posting semantics live in `revledger-core`; this
//! crate only persists and coordinates.
//!
//! # Modules
//!
//! - `memory` - In-memory append-only ledger store with idempotent writes
//! - `service` - Posting service: validation, per-contract locking, batching
//! - `audit` - Append-only audit trail of posting decisions
//! - `consolidation` - Period consolidation and reconciliation job

pub mod audit;
pub mod consolidation;
pub mod memory;
pub mod service;

pub use audit::{AuditAction, AuditRecord, AuditTrail};
pub use consolidation::{ConsolidationJob, ConsolidationRun};
pub use memory::{InMemoryLedgerStore, PostOutcome};
pub use service::{BatchFailure, BatchReport, PostingService};

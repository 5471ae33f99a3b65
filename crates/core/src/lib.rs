//! Core business logic for RevLedger.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, posting rules, and calculations live here.
//!
//! # Modules
//!
//! - `ledger` - Event model, posting rule engine, and balance tracking
//! - `contract` - Contract, performance obligation, and billing schedule types
//! - `consolidation` - Period summaries, trial balance, and reconciliation

pub mod consolidation;
pub mod contract;
pub mod ledger;

//! Revenue-recognition ledger logic.
//!
//! This module implements the core posting pipeline:
//! - Business event model (billing, cash receipt, revenue recognition)
//! - Chart of accounts for IFRS 15 positions
//! - Contract position tracking (replay from entries)
//! - Posting rule engine (the single authoritative debit/credit table)
//! - Ledger entry and reversal types
//! - Error types for posting operations

pub mod account;
pub mod balance;
pub mod entry;
pub mod error;
pub mod event;
pub mod posting;

#[cfg(test)]
mod posting_props;

pub use account::{Account, AccountNature};
pub use balance::{ContractBalanceSnapshot, ContractPosition};
pub use entry::{LedgerEntry, LedgerEntryDraft};
pub use error::PostingError;
pub use event::{EventKind, RevenueEvent};
pub use posting::PostingEngine;

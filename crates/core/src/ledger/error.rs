//! Error types for posting operations.

use revledger_shared::error::AppError;
use revledger_shared::types::{ContractId, Currency, LedgerEntryId, PerformanceObligationId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::contract::BillingStatus;

/// Errors that can occur while deriving or persisting postings.
///
/// Re-delivery of a known event id is NOT an error; it is reported as an
/// idempotent no-op success by the store.
#[derive(Debug, Error)]
pub enum PostingError {
    // ========== Event Validation Errors ==========
    /// Event amount must be positive.
    #[error("Event amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// The rejected amount.
        amount: Decimal,
    },

    /// The event references a contract the engine does not know.
    #[error("Unknown contract: {0}")]
    UnknownContract(ContractId),

    /// The event references an obligation that does not exist.
    #[error("Unknown performance obligation: {0}")]
    UnknownObligation(PerformanceObligationId),

    /// The referenced obligation belongs to a different contract.
    #[error("Obligation {obligation_id} does not belong to contract {contract_id}")]
    ObligationContractMismatch {
        /// The obligation referenced by the event.
        obligation_id: PerformanceObligationId,
        /// The contract the event was addressed to.
        contract_id: ContractId,
    },

    /// Event currency does not match the contract currency.
    #[error("Event currency {actual} does not match contract currency {expected}")]
    CurrencyMismatch {
        /// The contract's currency.
        expected: Currency,
        /// The currency carried by the event.
        actual: Currency,
    },

    // ========== Billing Schedule Errors ==========
    /// Invalid billing schedule status transition.
    #[error("Invalid billing status transition from {from:?} to {to:?}")]
    InvalidStatusTransition {
        /// The current status.
        from: BillingStatus,
        /// The requested status.
        to: BillingStatus,
    },

    // ========== Reversal Errors ==========
    /// Ledger entry not found.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(LedgerEntryId),

    /// Entry has already been reversed.
    #[error("Ledger entry {0} has already been reversed")]
    AlreadyReversed(LedgerEntryId),

    // ========== Concurrency Errors ==========
    /// Per-contract serialization was violated; the caller must retry.
    #[error("Concurrent modification detected for contract {0}, please retry")]
    ConcurrentModification(ContractId),

    // ========== Storage Errors ==========
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PostingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount { .. } => "NON_POSITIVE_AMOUNT",
            Self::UnknownContract(_) => "UNKNOWN_CONTRACT",
            Self::UnknownObligation(_) => "UNKNOWN_OBLIGATION",
            Self::ObligationContractMismatch { .. } => "OBLIGATION_CONTRACT_MISMATCH",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }

    /// Returns true if this error rejects the event before anything persists.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NonPositiveAmount { .. }
                | Self::UnknownContract(_)
                | Self::UnknownObligation(_)
                | Self::ObligationContractMismatch { .. }
                | Self::CurrencyMismatch { .. }
        )
    }
}

/// Maps posting errors onto the application-wide error categories at the
/// crate boundary.
impl From<PostingError> for AppError {
    fn from(err: PostingError) -> Self {
        match err {
            PostingError::UnknownContract(_)
            | PostingError::UnknownObligation(_)
            | PostingError::EntryNotFound(_) => Self::NotFound(err.to_string()),
            PostingError::NonPositiveAmount { .. }
            | PostingError::CurrencyMismatch { .. }
            | PostingError::ObligationContractMismatch { .. } => {
                Self::Validation(err.to_string())
            }
            PostingError::InvalidStatusTransition { .. } | PostingError::AlreadyReversed(_) => {
                Self::BusinessRule(err.to_string())
            }
            PostingError::ConcurrentModification(_) => Self::Conflict(err.to_string()),
            PostingError::Storage(_) => Self::Storage(err.to_string()),
        }
    }
}

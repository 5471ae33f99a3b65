//! Business event model for the revenue-recognition pipeline.
//!
//! External collaborators (billing schedule, payment recording, the five-step
//! IFRS 15 calculation) emit these events; the posting rule engine converts
//! them into balanced journal entries. Events are idempotent by `event_id`.

use chrono::{DateTime, Utc};
use revledger_shared::types::{ContractId, Currency, EventId, PerformanceObligationId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::PostingError;

/// What happened: an invoice, a cash receipt, or revenue earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// An invoice has been issued against the contract.
    Billing {
        /// The obligation the invoice relates to, when known.
        performance_obligation_id: Option<PerformanceObligationId>,
    },
    /// Cash has been received against the contract.
    Cash,
    /// Incremental or full revenue has been earned.
    ///
    /// The amount is the revenue recognized in this increment, not the
    /// obligation's total.
    Recognition {
        /// The obligation whose revenue is being recognized.
        performance_obligation_id: PerformanceObligationId,
    },
}

/// A business event describing a billing, cash, or recognition occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueEvent {
    /// Caller-supplied idempotency key, globally unique per logical occurrence.
    pub event_id: EventId,
    /// The contract this event applies to.
    pub contract_id: ContractId,
    /// Positive amount in the contract currency.
    pub amount: Decimal,
    /// The currency the amount is denominated in.
    pub currency: Currency,
    /// When the occurrence happened.
    pub occurred_at: DateTime<Utc>,
    /// The event variant and its payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl EventKind {
    /// Rank used to order same-timestamp events deterministically.
    ///
    /// Invoices precede cash (cash settles AR); recognition comes last since
    /// its ordering does not change the net position in this model.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Billing { .. } => 0,
            Self::Cash => 1,
            Self::Recognition { .. } => 2,
        }
    }

    /// Returns the obligation reference carried by this event, if any.
    #[must_use]
    pub const fn performance_obligation_id(self) -> Option<PerformanceObligationId> {
        match self {
            Self::Billing {
                performance_obligation_id,
            } => performance_obligation_id,
            Self::Cash => None,
            Self::Recognition {
                performance_obligation_id,
            } => Some(performance_obligation_id),
        }
    }
}

impl RevenueEvent {
    /// Validates the event payload.
    ///
    /// # Errors
    ///
    /// Returns `PostingError::NonPositiveAmount` if the amount is zero or
    /// negative.
    pub fn validate(&self) -> Result<(), PostingError> {
        if self.amount <= Decimal::ZERO {
            return Err(PostingError::NonPositiveAmount {
                amount: self.amount,
            });
        }
        Ok(())
    }

    /// Key used to order a batch of events deterministically.
    #[must_use]
    pub fn sort_key(&self) -> (DateTime<Utc>, u8) {
        (self.occurred_at, self.kind.rank())
    }
}

/// Sorts events into deterministic application order.
///
/// Events are ordered by timestamp, then by kind (billing, cash, recognition)
/// when timestamps collide.
pub fn sort_events(events: &mut [RevenueEvent]) {
    events.sort_by_key(RevenueEvent::sort_key);
}

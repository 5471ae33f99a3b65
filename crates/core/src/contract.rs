//! Contract, performance obligation, and billing schedule types.
//!
//! These records are created and mutated by external collaborators (contract
//! CRUD, the five-step IFRS 15 calculation, the billing scheduler). The
//! engine only validates references against them and consumes the events
//! their transitions produce.

use chrono::{DateTime, Utc};
use revledger_shared::types::{
    BillingScheduleEntryId, ContractId, Currency, EventId, Money, PerformanceObligationId,
    TenantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::error::PostingError;
use crate::ledger::event::{EventKind, RevenueEvent};

/// A customer contract. Immutable once versioned; a new version is a new
/// logical contract state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Unique identifier.
    pub id: ContractId,
    /// The tenant that owns the contract.
    pub tenant_id: TenantId,
    /// Total contract value; all events must be denominated in its currency.
    pub total_value: Money,
}

impl Contract {
    /// The contract currency.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.total_value.currency
    }
}

/// How revenue for an obligation is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    /// Recognized in full when the obligation is satisfied.
    PointInTime,
    /// Recognized progressively as the obligation is satisfied.
    OverTime,
}

/// A distinct promise to transfer goods or services under IFRS 15.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceObligation {
    /// Unique identifier.
    pub id: PerformanceObligationId,
    /// The contract version this obligation belongs to.
    pub contract_id: ContractId,
    /// The transaction price allocated to this obligation.
    pub allocated_price: Decimal,
    /// The recognition method.
    pub recognition_method: RecognitionMethod,
    /// Percent complete, 0 to 100.
    pub percent_complete: Decimal,
    /// Whether the obligation has been fully satisfied.
    pub is_satisfied: bool,
}

/// Billing schedule entry status.
///
/// Entries progress `Scheduled -> Invoiced -> Paid`; each forward transition
/// emits exactly one event into the posting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    /// Not yet invoiced.
    Scheduled,
    /// Invoice issued; produces a billing event.
    Invoiced,
    /// Payment recorded; produces a cash event.
    Paid,
}

impl BillingStatus {
    /// Returns true if the transition to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::Invoiced) | (Self::Invoiced, Self::Paid)
        )
    }
}

/// One scheduled billing installment for a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingScheduleEntry {
    /// Unique identifier.
    pub id: BillingScheduleEntryId,
    /// The contract this installment bills.
    pub contract_id: ContractId,
    /// The obligation the installment relates to, when known.
    pub performance_obligation_id: Option<PerformanceObligationId>,
    /// Installment amount in the contract currency.
    pub amount: Money,
    /// Current status.
    pub status: BillingStatus,
}

impl BillingScheduleEntry {
    /// Marks the installment invoiced and emits the billing event.
    ///
    /// # Errors
    ///
    /// Returns `PostingError::InvalidStatusTransition` if the entry is not
    /// in `Scheduled` status.
    pub fn mark_invoiced(
        &mut self,
        event_id: EventId,
        occurred_at: DateTime<Utc>,
    ) -> Result<RevenueEvent, PostingError> {
        self.transition_to(BillingStatus::Invoiced)?;
        Ok(RevenueEvent {
            event_id,
            contract_id: self.contract_id,
            amount: self.amount.amount,
            currency: self.amount.currency,
            occurred_at,
            kind: EventKind::Billing {
                performance_obligation_id: self.performance_obligation_id,
            },
        })
    }

    /// Marks the installment paid and emits the cash event.
    ///
    /// # Errors
    ///
    /// Returns `PostingError::InvalidStatusTransition` if the entry is not
    /// in `Invoiced` status.
    pub fn mark_paid(
        &mut self,
        event_id: EventId,
        occurred_at: DateTime<Utc>,
    ) -> Result<RevenueEvent, PostingError> {
        self.transition_to(BillingStatus::Paid)?;
        Ok(RevenueEvent {
            event_id,
            contract_id: self.contract_id,
            amount: self.amount.amount,
            currency: self.amount.currency,
            occurred_at,
            kind: EventKind::Cash,
        })
    }

    fn transition_to(&mut self, next: BillingStatus) -> Result<(), PostingError> {
        if !self.status.can_transition_to(next) {
            return Err(PostingError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

//! Ledger entry domain types.
//!
//! Entries are immutable once posted. Corrections never delete history:
//! a reversal appends a new entry with debit and credit swapped and flags
//! the original as reversed.

use chrono::NaiveDate;
use revledger_shared::types::{
    ContractId, Currency, EventId, LedgerEntryId, PerformanceObligationId, TenantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::Account;

/// A journal-entry draft produced by the posting rule engine.
///
/// Drafts are balanced by construction: one debit and one credit of the same
/// amount, on different accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntryDraft {
    /// The tenant that owns the contract.
    pub tenant_id: TenantId,
    /// The contract this entry belongs to.
    pub contract_id: ContractId,
    /// The obligation this entry relates to, when known.
    pub performance_obligation_id: Option<PerformanceObligationId>,
    /// The business event that produced this entry (idempotency key).
    pub event_id: EventId,
    /// The entry date.
    pub entry_date: NaiveDate,
    /// The account debited.
    pub debit_account: Account,
    /// The account credited.
    pub credit_account: Account,
    /// Positive amount in the contract currency.
    pub amount: Decimal,
    /// The contract currency.
    pub currency: Currency,
    /// Optional memo/description.
    pub memo: Option<String>,
}

/// An immutable, posted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier for this entry.
    pub id: LedgerEntryId,
    /// The tenant that owns the contract.
    pub tenant_id: TenantId,
    /// The contract this entry belongs to.
    pub contract_id: ContractId,
    /// The obligation this entry relates to, when known.
    pub performance_obligation_id: Option<PerformanceObligationId>,
    /// The business event that produced this entry (idempotency key).
    pub event_id: EventId,
    /// The entry date.
    pub entry_date: NaiveDate,
    /// The account debited.
    pub debit_account: Account,
    /// The account credited.
    pub credit_account: Account,
    /// Positive amount in the contract currency.
    pub amount: Decimal,
    /// The contract currency.
    pub currency: Currency,
    /// Whether the entry has been posted to the ledger.
    pub is_posted: bool,
    /// Whether this entry has been offset by a paired reversal.
    pub is_reversed: bool,
    /// The reversing entry, once this entry has been reversed.
    pub reversed_entry_id: Option<LedgerEntryId>,
    /// Optional memo/description.
    pub memo: Option<String>,
}

impl LedgerEntry {
    /// Materializes a posted entry from a draft.
    #[must_use]
    pub fn from_draft(draft: LedgerEntryDraft, id: LedgerEntryId) -> Self {
        Self {
            id,
            tenant_id: draft.tenant_id,
            contract_id: draft.contract_id,
            performance_obligation_id: draft.performance_obligation_id,
            event_id: draft.event_id,
            entry_date: draft.entry_date,
            debit_account: draft.debit_account,
            credit_account: draft.credit_account,
            amount: draft.amount,
            currency: draft.currency,
            is_posted: true,
            is_reversed: false,
            reversed_entry_id: None,
            memo: draft.memo,
        }
    }

    /// Builds the offsetting draft for this entry.
    ///
    /// Debit and credit are swapped; the amount, contract, and obligation
    /// linkage are preserved. The reversal carries its own event id so the
    /// original event id becomes postable again once fully reversed.
    #[must_use]
    pub fn reversing_draft(&self, reversal_event_id: EventId, entry_date: NaiveDate) -> LedgerEntryDraft {
        LedgerEntryDraft {
            tenant_id: self.tenant_id,
            contract_id: self.contract_id,
            performance_obligation_id: self.performance_obligation_id,
            event_id: reversal_event_id,
            entry_date,
            debit_account: self.credit_account,
            credit_account: self.debit_account,
            amount: self.amount,
            currency: self.currency,
            memo: Some(format!(
                "Reversal of entry {}: {}",
                self.id,
                self.memo.clone().unwrap_or_default()
            )),
        }
    }
}

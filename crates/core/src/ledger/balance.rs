//! Contract position tracking.
//!
//! The ledger is the source of truth: a contract's position is always
//! recomputable by replaying its entries. `ContractBalanceSnapshot` is a
//! performance cache only and may be discarded at will.

use revledger_shared::types::ContractId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::Account;
use super::entry::LedgerEntry;
use super::event::EventKind;

/// Cumulative totals for a contract, from which all IFRS 15 positions derive.
///
/// Net position = recognized − billed: positive means recognized-but-unbilled
/// (Contract Asset), negative means billed-but-unrecognized (Contract
/// Liability).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPosition {
    /// Cumulative amount billed.
    pub billed: Decimal,
    /// Cumulative cash received.
    pub cash_received: Decimal,
    /// Cumulative revenue recognized.
    pub recognized: Decimal,
}

impl ContractPosition {
    /// The empty position.
    pub const ZERO: Self = Self {
        billed: Decimal::ZERO,
        cash_received: Decimal::ZERO,
        recognized: Decimal::ZERO,
    };

    /// Contract Asset balance: revenue recognized in excess of billings.
    #[must_use]
    pub fn contract_asset(&self) -> Decimal {
        (self.recognized - self.billed).max(Decimal::ZERO)
    }

    /// Contract Liability balance: billings in excess of revenue recognized.
    #[must_use]
    pub fn contract_liability(&self) -> Decimal {
        (self.billed - self.recognized).max(Decimal::ZERO)
    }

    /// Open Accounts Receivable: billed but not yet collected.
    ///
    /// Cash is only ever applied to AR up to the open balance (the excess
    /// posts to Contract Liability), so AR never goes negative.
    #[must_use]
    pub fn outstanding_receivable(&self) -> Decimal {
        (self.billed - self.cash_received).max(Decimal::ZERO)
    }

    /// Signed net position: positive is a Contract Asset, negative a
    /// Contract Liability.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.recognized - self.billed
    }

    /// Advances the position by one applied event.
    pub fn apply(&mut self, kind: EventKind, amount: Decimal) {
        match kind {
            EventKind::Billing { .. } => self.billed += amount,
            EventKind::Cash => self.cash_received += amount,
            EventKind::Recognition { .. } => self.recognized += amount,
        }
    }

    /// Recomputes the position by replaying ledger entries.
    ///
    /// Reversal pairs cancel within each account, so the fold needs no
    /// special casing: cash received is the net of the Cash account, revenue
    /// recognized is the net of the Revenue account, and billings are
    /// recovered from AR plus the cash applied against it.
    #[must_use]
    pub fn replay<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
    {
        let mut cash = Decimal::ZERO;
        let mut ar = Decimal::ZERO;
        let mut revenue = Decimal::ZERO;
        let mut advance_liability = Decimal::ZERO;

        for entry in entries {
            for (account, signed) in [
                (entry.debit_account, entry.amount),
                (entry.credit_account, -entry.amount),
            ] {
                match account {
                    Account::Cash => cash += signed,
                    Account::AccountsReceivable => ar += signed,
                    Account::Revenue => revenue -= signed,
                    Account::ContractAsset | Account::ContractLiability => {}
                }
            }
            // Cash in excess of open AR posts Dr Cash / Cr Contract Liability.
            if entry.debit_account == Account::Cash
                && entry.credit_account == Account::ContractLiability
            {
                advance_liability += entry.amount;
            }
            if entry.debit_account == Account::ContractLiability
                && entry.credit_account == Account::Cash
            {
                advance_liability -= entry.amount;
            }
        }

        // AR net = billed − cash applied to AR; cash applied = cash − advances.
        let cash_applied_to_ar = cash - advance_liability;
        Self {
            billed: ar + cash_applied_to_ar,
            cash_received: cash,
            recognized: revenue,
        }
    }
}

/// Derived, mutable cache of a contract's position.
///
/// Rebuilt whenever a new entry is appended; never the source of truth. The
/// `version` field backs the optimistic concurrency check on writers, and
/// `last_sequence` records the last store sequence number folded in so
/// readers can replay only the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBalanceSnapshot {
    /// The contract this snapshot caches.
    pub contract_id: ContractId,
    /// The cached cumulative totals.
    pub position: ContractPosition,
    /// Optimistic concurrency version, bumped on every update.
    pub version: i64,
    /// Store sequence number of the last entry folded into this snapshot.
    pub last_sequence: u64,
}

impl ContractBalanceSnapshot {
    /// Creates an empty snapshot for a contract.
    #[must_use]
    pub fn empty(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            position: ContractPosition::ZERO,
            version: 0,
            last_sequence: 0,
        }
    }

    /// Returns the successor snapshot with an advanced position.
    #[must_use]
    pub fn advanced(&self, position: ContractPosition, last_sequence: u64) -> Self {
        Self {
            contract_id: self.contract_id,
            position,
            version: self.version + 1,
            last_sequence,
        }
    }
}

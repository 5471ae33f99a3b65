//! Chart of accounts for IFRS 15 revenue recognition.
//!
//! The account set is closed: the posting rule engine is the only writer of
//! these accounts, so adding an account forces a compile-time-visible update
//! to the rule table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The five ledger accounts touched by the revenue-recognition pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Account {
    /// Cash received from the customer.
    Cash,
    /// Amounts billed to the customer but not yet collected.
    AccountsReceivable,
    /// Revenue recognized in excess of amounts billed.
    ContractAsset,
    /// Amounts billed or received in excess of revenue recognized.
    ContractLiability,
    /// Revenue earned from satisfied performance obligations.
    Revenue,
}

/// Natural balance side of an account.
///
/// - Asset accounts: balance += debit - credit (debit-normal)
/// - Liability/revenue accounts: balance += credit - debit (credit-normal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountNature {
    /// Debit-normal accounts (Cash, AR, Contract Asset)
    DebitNormal,
    /// Credit-normal accounts (Contract Liability, Revenue)
    CreditNormal,
}

impl Account {
    /// Returns the ledger code for this account.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Cash => "1000",
            Self::AccountsReceivable => "1200",
            Self::ContractAsset => "1300",
            Self::ContractLiability => "2600",
            Self::Revenue => "4000",
        }
    }

    /// Returns the display name for this account.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::AccountsReceivable => "Accounts Receivable",
            Self::ContractAsset => "Contract Asset",
            Self::ContractLiability => "Contract Liability",
            Self::Revenue => "Revenue",
        }
    }

    /// Returns the natural balance side of this account.
    #[must_use]
    pub const fn nature(self) -> AccountNature {
        match self {
            Self::Cash | Self::AccountsReceivable | Self::ContractAsset => {
                AccountNature::DebitNormal
            }
            Self::ContractLiability | Self::Revenue => AccountNature::CreditNormal,
        }
    }
}

impl AccountNature {
    /// Calculates the balance change for a debit/credit pair.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::DebitNormal => debit - credit,
            Self::CreditNormal => credit - debit,
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.code(), self.name())
    }
}

//! Period consolidation, trial balance, and reconciliation.
//!
//! Consolidation reads only ledger entries, never the balance snapshot, so a
//! cache defect can never leak into the period summaries that disclosure
//! reports are built from.

use chrono::NaiveDate;
use revledger_shared::types::{ContractId, TenantId, convert_with_rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::account::{Account, AccountNature};
use crate::ledger::entry::LedgerEntry;

/// Per-account debit/credit totals and net (debit-positive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    /// The account.
    pub account: Account,
    /// Total amount debited.
    pub debit: Decimal,
    /// Total amount credited.
    pub credit: Decimal,
    /// Net balance, debit-positive.
    pub net: Decimal,
}

/// Rolls entries up into per-account debit/credit/net lines, ordered by
/// account code.
#[must_use]
pub fn trial_balance<'a, I>(entries: I) -> Vec<TrialBalanceLine>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut lines: Vec<TrialBalanceLine> = Vec::new();
    fn line_for(lines: &mut Vec<TrialBalanceLine>, account: Account) -> usize {
        if let Some(i) = lines.iter().position(|l| l.account == account) {
            i
        } else {
            lines.push(TrialBalanceLine {
                account,
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
                net: Decimal::ZERO,
            });
            lines.len() - 1
        }
    }

    let mut touched: Vec<(Account, Decimal, Decimal)> = Vec::new();
    for entry in entries {
        touched.push((entry.debit_account, entry.amount, Decimal::ZERO));
        touched.push((entry.credit_account, Decimal::ZERO, entry.amount));
    }
    for (account, debit, credit) in touched {
        let i = line_for(&mut lines, account);
        lines[i].debit += debit;
        lines[i].credit += credit;
        lines[i].net = lines[i].debit - lines[i].credit;
    }

    lines.sort_by_key(|l| l.account);
    lines
}

/// Sums total debits and credits over entries; the two must always be equal.
#[must_use]
pub fn total_debits_credits<'a, I>(entries: I) -> (Decimal, Decimal)
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    for entry in entries {
        debits += entry.amount;
        credits += entry.amount;
    }
    (debits, credits)
}

/// Consolidated asset/liability figures for one contract over one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// The tenant the contract belongs to.
    pub tenant_id: TenantId,
    /// The contract summarized.
    pub contract_id: ContractId,
    /// First day of the period (inclusive).
    pub period_start: NaiveDate,
    /// Last day of the period (inclusive).
    pub period_end: NaiveDate,
    /// Contract Asset balance at period open.
    pub opening_asset: Decimal,
    /// Contract Liability balance at period open.
    pub opening_liability: Decimal,
    /// Net Contract Asset movement within the period.
    pub asset_movement: Decimal,
    /// Net Contract Liability movement within the period.
    pub liability_movement: Decimal,
    /// Contract Asset balance at period close.
    pub closing_asset: Decimal,
    /// Contract Liability balance at period close.
    pub closing_liability: Decimal,
}

impl PeriodSummary {
    /// Restates the summary into a presentation currency.
    ///
    /// The engine never chooses a rate; group consolidation supplies one and
    /// every figure is converted with banker's rounding to two decimal
    /// places. Each figure rounds independently, so run [`reconcile`] on the
    /// source summary, not on the restated one.
    #[must_use]
    pub fn restated(&self, rate: Decimal) -> Self {
        let convert = |amount| convert_with_rate(amount, rate, 2);
        Self {
            opening_asset: convert(self.opening_asset),
            opening_liability: convert(self.opening_liability),
            asset_movement: convert(self.asset_movement),
            liability_movement: convert(self.liability_movement),
            closing_asset: convert(self.closing_asset),
            closing_liability: convert(self.closing_liability),
            ..*self
        }
    }
}

/// A reconciliation failure: opening plus movements did not reproduce the
/// closing balance. Reported to operators, never auto-corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationMismatch {
    /// The contract whose summary failed the check.
    pub contract_id: ContractId,
    /// The account side that failed.
    pub account: Account,
    /// Opening plus movements.
    pub expected_closing: Decimal,
    /// The closing balance the summary carries.
    pub actual_closing: Decimal,
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Last day of the period.
    pub period_end: NaiveDate,
}

impl std::fmt::Display for ReconciliationMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reconciliation mismatch for contract {} on {}: opening + movements = {}, closing = {} ({} to {})",
            self.contract_id,
            self.account,
            self.expected_closing,
            self.actual_closing,
            self.period_start,
            self.period_end
        )
    }
}

/// Nature-aware balance of one account over a filtered set of entries.
fn account_balance<'a, I, F>(entries: I, account: Account, include: F) -> Decimal
where
    I: IntoIterator<Item = &'a LedgerEntry>,
    F: Fn(&LedgerEntry) -> bool,
{
    let mut debit = Decimal::ZERO;
    let mut credit = Decimal::ZERO;
    for entry in entries {
        if !include(entry) {
            continue;
        }
        if entry.debit_account == account {
            debit += entry.amount;
        }
        if entry.credit_account == account {
            credit += entry.amount;
        }
    }
    match account.nature() {
        AccountNature::DebitNormal => debit - credit,
        AccountNature::CreditNormal => credit - debit,
    }
}

/// Builds the period summary for one contract from its ledger entries.
///
/// Opening balances fold entries dated before the period; movements fold the
/// period window; closing balances fold everything through period end. The
/// entries must all belong to the same contract and tenant.
#[must_use]
pub fn summarize_contract_period(
    tenant_id: TenantId,
    contract_id: ContractId,
    entries: &[LedgerEntry],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> PeriodSummary {
    let opening_asset =
        account_balance(entries, Account::ContractAsset, |e| e.entry_date < period_start);
    let opening_liability =
        account_balance(entries, Account::ContractLiability, |e| e.entry_date < period_start);
    let in_period =
        |e: &LedgerEntry| e.entry_date >= period_start && e.entry_date <= period_end;
    let asset_movement = account_balance(entries, Account::ContractAsset, in_period);
    let liability_movement = account_balance(entries, Account::ContractLiability, in_period);
    let closing_asset =
        account_balance(entries, Account::ContractAsset, |e| e.entry_date <= period_end);
    let closing_liability =
        account_balance(entries, Account::ContractLiability, |e| e.entry_date <= period_end);

    PeriodSummary {
        tenant_id,
        contract_id,
        period_start,
        period_end,
        opening_asset,
        opening_liability,
        asset_movement,
        liability_movement,
        closing_asset,
        closing_liability,
    }
}

/// Checks the reconciliation invariant on a summary: opening + movements must
/// equal closing, for the asset and the liability side symmetrically.
///
/// Returns one mismatch per failing side; an empty result means the summary
/// reconciles.
#[must_use]
pub fn reconcile(summary: &PeriodSummary) -> Vec<ReconciliationMismatch> {
    let mut mismatches = Vec::new();

    let checks = [
        (
            Account::ContractAsset,
            summary.opening_asset + summary.asset_movement,
            summary.closing_asset,
        ),
        (
            Account::ContractLiability,
            summary.opening_liability + summary.liability_movement,
            summary.closing_liability,
        ),
    ];
    for (account, expected, actual) in checks {
        if expected != actual {
            mismatches.push(ReconciliationMismatch {
                contract_id: summary.contract_id,
                account,
                expected_closing: expected,
                actual_closing: actual,
                period_start: summary.period_start,
                period_end: summary.period_end,
            });
        }
    }

    mismatches
}

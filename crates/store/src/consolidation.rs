//! Period consolidation job.
//!
//! Walks the entry log, builds one period summary per contract, and checks
//! the reconciliation invariant on each. The job reads only entries; the
//! snapshot cache plays no part, so a cache defect cannot distort a period
//! close. Mismatches are reported, never corrected.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use revledger_core::consolidation::{
    PeriodSummary, ReconciliationMismatch, reconcile, summarize_contract_period,
};
use revledger_core::ledger::LedgerEntry;
use revledger_shared::types::ContractId;

use crate::memory::InMemoryLedgerStore;

/// Output of one consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidationRun {
    /// One summary per contract with entries, ordered by contract id.
    pub summaries: Vec<PeriodSummary>,
    /// Reconciliation failures found during the run.
    pub mismatches: Vec<ReconciliationMismatch>,
}

/// Consolidates contract positions over a reporting period.
pub struct ConsolidationJob {
    store: Arc<InMemoryLedgerStore>,
}

impl ConsolidationJob {
    /// Creates a job over a store.
    #[must_use]
    pub fn new(store: Arc<InMemoryLedgerStore>) -> Self {
        Self { store }
    }

    /// Summarizes every contract over the period and reconciles each summary.
    pub async fn run(&self, period_start: NaiveDate, period_end: NaiveDate) -> ConsolidationRun {
        let entries = self.store.all_entries().await;

        let mut by_contract: HashMap<ContractId, Vec<LedgerEntry>> = HashMap::new();
        for entry in entries {
            by_contract.entry(entry.contract_id).or_default().push(entry);
        }

        let mut contracts: Vec<ContractId> = by_contract.keys().copied().collect();
        contracts.sort_by_key(|id| id.into_inner());

        let mut summaries = Vec::with_capacity(contracts.len());
        let mut mismatches = Vec::new();
        for contract_id in contracts {
            let contract_entries = &by_contract[&contract_id];
            let tenant_id = contract_entries[0].tenant_id;
            let summary = summarize_contract_period(
                tenant_id,
                contract_id,
                contract_entries,
                period_start,
                period_end,
            );
            for mismatch in reconcile(&summary) {
                tracing::warn!(
                    contract_id = %mismatch.contract_id,
                    account = %mismatch.account,
                    expected = %mismatch.expected_closing,
                    actual = %mismatch.actual_closing,
                    "reconciliation mismatch"
                );
                mismatches.push(mismatch);
            }
            summaries.push(summary);
        }

        tracing::info!(
            contracts = summaries.len(),
            mismatches = mismatches.len(),
            %period_start,
            %period_end,
            "consolidation run complete"
        );
        ConsolidationRun {
            summaries,
            mismatches,
        }
    }
}

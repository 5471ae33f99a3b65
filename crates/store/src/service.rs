//! The posting service.
//!
//! Orchestrates the full posting pipeline: reference validation, per-contract
//! write serialization, derivation through the posting rule engine, the
//! idempotent append, snapshot maintenance, and audit. This is the only
//! component that writes to the store; everything else reads.

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use revledger_core::contract::{Contract, PerformanceObligation};
use revledger_core::ledger::{
    ContractBalanceSnapshot, ContractPosition, LedgerEntry, PostingEngine, PostingError,
    RevenueEvent,
};
use revledger_core::ledger::event::sort_events;
use revledger_shared::config::LedgerConfig;
use revledger_shared::types::{ContractId, EventId, LedgerEntryId, PerformanceObligationId};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::audit::{AuditAction, AuditRecord, AuditTrail};
use crate::memory::{InMemoryLedgerStore, PostOutcome};

/// Tally of a committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Events that produced new entries.
    pub posted: usize,
    /// Re-delivered events suppressed as duplicates.
    pub duplicates: usize,
    /// Chunks the batch was committed in.
    pub chunks: usize,
}

/// A batch stopped at a failing event.
///
/// Events before `failed_index` are committed and stay committed. The caller
/// may fix the failing event and re-submit the whole batch: the committed
/// prefix is suppressed as duplicates.
#[derive(Debug, Error)]
#[error("batch failed at event {failed_index}: {error}")]
pub struct BatchFailure {
    /// Index of the failing event in deterministic batch order.
    pub failed_index: usize,
    /// The error the event failed with.
    #[source]
    pub error: PostingError,
}

/// Validates, serializes, derives, and persists revenue events.
pub struct PostingService {
    store: Arc<InMemoryLedgerStore>,
    audit: Arc<AuditTrail>,
    contracts: DashMap<ContractId, Contract>,
    obligations: DashMap<PerformanceObligationId, PerformanceObligation>,
    locks: DashMap<ContractId, Arc<Mutex<()>>>,
    config: LedgerConfig,
}

impl PostingService {
    /// Creates a service over a fresh store and audit trail.
    #[must_use]
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            store: Arc::new(InMemoryLedgerStore::new()),
            audit: Arc::new(AuditTrail::new()),
            contracts: DashMap::new(),
            obligations: DashMap::new(),
            locks: DashMap::new(),
            config,
        }
    }

    /// The underlying entry store.
    #[must_use]
    pub fn store(&self) -> Arc<InMemoryLedgerStore> {
        Arc::clone(&self.store)
    }

    /// The audit trail.
    #[must_use]
    pub fn audit(&self) -> Arc<AuditTrail> {
        Arc::clone(&self.audit)
    }

    /// Registers a contract so events against it validate.
    pub fn register_contract(&self, contract: Contract) {
        self.contracts.insert(contract.id, contract);
    }

    /// Registers a performance obligation so events referencing it validate.
    pub fn register_obligation(&self, obligation: PerformanceObligation) {
        self.obligations.insert(obligation.id, obligation);
    }

    /// Posts one event through the full pipeline.
    ///
    /// Re-delivery of a known event id is a no-op success reported as
    /// `PostOutcome::AlreadyPosted`; it is audited but writes nothing.
    ///
    /// # Errors
    ///
    /// Returns a validation error before anything persists, or
    /// `ConcurrentModification` if the snapshot moved under the writer (the
    /// caller should retry).
    pub async fn post_event(
        &self,
        event: RevenueEvent,
        actor: &str,
    ) -> Result<PostOutcome, PostingError> {
        let contract = self.contract(event.contract_id)?;
        self.validate_obligation(&event)?;

        let lock = self.contract_lock(event.contract_id);
        let _guard = lock.lock().await;

        let (snapshot, position, _) = self.replayed_position(event.contract_id).await;
        let drafts = PostingEngine::derive_postings(&event, &contract, &position)?;

        match self.store.append_event(event.event_id, drafts).await? {
            PostOutcome::AlreadyPosted => {
                tracing::warn!(
                    event_id = %event.event_id,
                    contract_id = %event.contract_id,
                    "re-delivered event suppressed"
                );
                self.audit
                    .record(AuditRecord::new(
                        AuditAction::DuplicateSuppressed,
                        event.event_id,
                        event.contract_id,
                        vec![],
                        actor,
                    ))
                    .await;
                Ok(PostOutcome::AlreadyPosted)
            }
            PostOutcome::Posted { entries } => {
                let mut next = position;
                next.apply(event.kind, event.amount);
                // Under the contract lock nothing else appends for this
                // contract, so the store's latest sequence is safe to stamp.
                let last_sequence = self.store.last_sequence().await;
                self.store
                    .put_snapshot(snapshot.advanced(next, last_sequence), snapshot.version)
                    .await?;

                tracing::info!(
                    event_id = %event.event_id,
                    contract_id = %event.contract_id,
                    amount = %event.amount,
                    entries = entries.len(),
                    "event posted"
                );
                self.audit
                    .record(AuditRecord::new(
                        AuditAction::Posted,
                        event.event_id,
                        event.contract_id,
                        entries.iter().map(|e| e.id).collect(),
                        actor,
                    ))
                    .await;
                Ok(PostOutcome::Posted { entries })
            }
        }
    }

    /// Posts a batch of events in deterministic order, committed in chunks.
    ///
    /// Events are sorted by timestamp (billing before cash before recognition
    /// on ties) and committed in chunks sized so one chunk stays under the
    /// configured store operation ceiling. Each event costs at most two entry
    /// appends plus one snapshot write.
    ///
    /// # Errors
    ///
    /// Stops at the first failing event; see [`BatchFailure`].
    pub async fn post_batch(
        &self,
        mut events: Vec<RevenueEvent>,
        actor: &str,
    ) -> Result<BatchReport, BatchFailure> {
        sort_events(&mut events);

        let per_chunk = (self.config.batch_ceiling / 3).max(1);
        let mut report = BatchReport::default();
        for (chunk_index, chunk) in events.chunks(per_chunk).enumerate() {
            tracing::debug!(chunk = chunk_index, events = chunk.len(), "committing batch chunk");
            for (offset, event) in chunk.iter().enumerate() {
                match self.post_event(event.clone(), actor).await {
                    Ok(PostOutcome::Posted { .. }) => report.posted += 1,
                    Ok(PostOutcome::AlreadyPosted) => report.duplicates += 1,
                    Err(error) => {
                        return Err(BatchFailure {
                            failed_index: chunk_index * per_chunk + offset,
                            error,
                        });
                    }
                }
            }
            report.chunks += 1;
        }
        Ok(report)
    }

    /// Reverses a posted entry.
    ///
    /// Appends the offsetting entry dated `entry_date`, flags the original,
    /// and rebuilds the contract snapshot from a full replay. The reason, if
    /// given, lands in the reversal memo.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` or `AlreadyReversed`.
    pub async fn reverse_entry(
        &self,
        entry_id: LedgerEntryId,
        entry_date: NaiveDate,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<LedgerEntry, PostingError> {
        let original = self
            .store
            .entry(entry_id)
            .await
            .ok_or(PostingError::EntryNotFound(entry_id))?;

        let lock = self.contract_lock(original.contract_id);
        let _guard = lock.lock().await;

        let reversal_event_id = EventId::new();
        let reversal = self
            .store
            .reverse(entry_id, reversal_event_id, entry_date, reason)
            .await?;

        // A reversal moves the position backwards, so the snapshot is rebuilt
        // from a full replay rather than advanced.
        let (entries, last_sequence) = self.store.contract_tail(original.contract_id, 0).await;
        let position = ContractPosition::replay(&entries);
        let snapshot = self
            .store
            .snapshot(original.contract_id)
            .await
            .unwrap_or_else(|| ContractBalanceSnapshot::empty(original.contract_id));
        self.store
            .put_snapshot(snapshot.advanced(position, last_sequence), snapshot.version)
            .await?;

        tracing::info!(
            entry_id = %entry_id,
            reversal_id = %reversal.id,
            contract_id = %original.contract_id,
            amount = %original.amount,
            "entry reversed"
        );
        self.audit
            .record(AuditRecord::new(
                AuditAction::Reversed,
                reversal_event_id,
                original.contract_id,
                vec![reversal.id],
                actor,
            ))
            .await;
        Ok(reversal)
    }

    /// Returns the contract's current position.
    ///
    /// Served from the snapshot plus a replay of the tail. When the tail has
    /// outgrown the rebuild threshold the snapshot is refreshed in place,
    /// but only if the contract lock is free; readers never block writers.
    pub async fn position(&self, contract_id: ContractId) -> ContractPosition {
        let (_, position, tail_len) = self.replayed_position(contract_id).await;

        if tail_len > self.config.snapshot_rebuild_threshold {
            let lock = self.contract_lock(contract_id);
            if let Ok(_guard) = lock.try_lock() {
                // Re-read under the lock; the pre-lock tail may be stale.
                let (snapshot, position, _) = self.replayed_position(contract_id).await;
                let last_sequence = self.store.last_sequence().await;
                if self
                    .store
                    .put_snapshot(snapshot.advanced(position, last_sequence), snapshot.version)
                    .await
                    .is_ok()
                {
                    tracing::debug!(contract_id = %contract_id, "snapshot rebuilt on read");
                }
                return position;
            }
        }
        position
    }

    /// Returns all entries for a contract, in append order.
    pub async fn entries(&self, contract_id: ContractId) -> Vec<LedgerEntry> {
        let (entries, _) = self.store.contract_tail(contract_id, 0).await;
        entries
    }

    /// Snapshot plus tail replay; returns the snapshot read, the current
    /// position, and the tail length.
    async fn replayed_position(
        &self,
        contract_id: ContractId,
    ) -> (ContractBalanceSnapshot, ContractPosition, u64) {
        let snapshot = self
            .store
            .snapshot(contract_id)
            .await
            .unwrap_or_else(|| ContractBalanceSnapshot::empty(contract_id));
        let (tail, _) = self.store.contract_tail(contract_id, snapshot.last_sequence).await;
        let delta = ContractPosition::replay(&tail);
        let position = ContractPosition {
            billed: snapshot.position.billed + delta.billed,
            cash_received: snapshot.position.cash_received + delta.cash_received,
            recognized: snapshot.position.recognized + delta.recognized,
        };
        (snapshot, position, tail.len() as u64)
    }

    fn contract(&self, contract_id: ContractId) -> Result<Contract, PostingError> {
        self.contracts
            .get(&contract_id)
            .map(|c| c.value().clone())
            .ok_or(PostingError::UnknownContract(contract_id))
    }

    fn validate_obligation(&self, event: &RevenueEvent) -> Result<(), PostingError> {
        if let Some(obligation_id) = event.kind.performance_obligation_id() {
            let obligation = self
                .obligations
                .get(&obligation_id)
                .ok_or(PostingError::UnknownObligation(obligation_id))?;
            if obligation.contract_id != event.contract_id {
                return Err(PostingError::ObligationContractMismatch {
                    obligation_id,
                    contract_id: event.contract_id,
                });
            }
        }
        Ok(())
    }

    fn contract_lock(&self, contract_id: ContractId) -> Arc<Mutex<()>> {
        self.locks
            .entry(contract_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

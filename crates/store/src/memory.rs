//! In-memory append-only ledger store.
//!
//! Entries are never updated or deleted once appended; the only permitted
//! mutation is flagging an entry as reversed when its offsetting entry is
//! appended. The store is the idempotency boundary: the append and the
//! duplicate probe happen under one write lock, so a re-delivered event can
//! never double-post.

use std::collections::HashMap;

use chrono::NaiveDate;
use revledger_core::ledger::{ContractBalanceSnapshot, LedgerEntry, LedgerEntryDraft, PostingError};
use revledger_shared::types::{ContractId, EventId, LedgerEntryId};
use tokio::sync::RwLock;

/// Result of appending an event's entries to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// The event was new; these entries were appended.
    Posted {
        /// The materialized entries, in append order.
        entries: Vec<LedgerEntry>,
    },
    /// The event id was already posted; nothing was written.
    AlreadyPosted,
}

#[derive(Debug, Default)]
struct Inner {
    /// Append-only log; an entry's store sequence is its index plus one.
    entries: Vec<LedgerEntry>,
    /// Entry indices by the event that produced them.
    by_event: HashMap<EventId, Vec<usize>>,
    /// Cached positions, keyed by contract.
    snapshots: HashMap<ContractId, ContractBalanceSnapshot>,
}

/// Append-only ledger store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically appends the entries derived from one event.
    ///
    /// If the event id already has non-reversed entries in the log, nothing
    /// is written and the call reports `AlreadyPosted`. An event id whose
    /// entries have all been reversed is treated as new again.
    ///
    /// # Errors
    ///
    /// Returns `PostingError::Storage` if the draft set is empty.
    pub async fn append_event(
        &self,
        event_id: EventId,
        drafts: Vec<LedgerEntryDraft>,
    ) -> Result<PostOutcome, PostingError> {
        if drafts.is_empty() {
            return Err(PostingError::Storage(format!(
                "no entries derived for event {event_id}"
            )));
        }

        let mut inner = self.inner.write().await;

        if let Some(indices) = inner.by_event.get(&event_id)
            && indices.iter().any(|&i| !inner.entries[i].is_reversed)
        {
            return Ok(PostOutcome::AlreadyPosted);
        }

        let mut appended = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let entry = LedgerEntry::from_draft(draft, LedgerEntryId::new());
            let index = inner.entries.len();
            inner.by_event.entry(event_id).or_default().push(index);
            inner.entries.push(entry.clone());
            appended.push(entry);
        }

        Ok(PostOutcome::Posted { entries: appended })
    }

    /// Appends the offsetting entry for `entry_id` and flags the original as
    /// reversed. A supplied reason is appended to the reversal memo.
    ///
    /// The reversal carries its own event id, so the original event id
    /// becomes postable again once every entry it produced is reversed.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the entry does not exist, or
    /// `AlreadyReversed` if it has already been offset.
    pub async fn reverse(
        &self,
        entry_id: LedgerEntryId,
        reversal_event_id: EventId,
        entry_date: NaiveDate,
        reason: Option<&str>,
    ) -> Result<LedgerEntry, PostingError> {
        let mut inner = self.inner.write().await;

        let index = inner
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or(PostingError::EntryNotFound(entry_id))?;
        if inner.entries[index].is_reversed {
            return Err(PostingError::AlreadyReversed(entry_id));
        }

        let mut draft = inner.entries[index].reversing_draft(reversal_event_id, entry_date);
        if let Some(reason) = reason {
            draft.memo = Some(match draft.memo {
                Some(memo) => format!("{memo} ({reason})"),
                None => reason.to_string(),
            });
        }
        let reversal = LedgerEntry::from_draft(draft, LedgerEntryId::new());

        inner.entries[index].is_reversed = true;
        inner.entries[index].reversed_entry_id = Some(reversal.id);

        let reversal_index = inner.entries.len();
        inner
            .by_event
            .entry(reversal_event_id)
            .or_default()
            .push(reversal_index);
        inner.entries.push(reversal.clone());

        Ok(reversal)
    }

    /// Looks up a single entry by id.
    pub async fn entry(&self, entry_id: LedgerEntryId) -> Option<LedgerEntry> {
        let inner = self.inner.read().await;
        inner.entries.iter().find(|e| e.id == entry_id).cloned()
    }

    /// Returns all entries for a contract, in append order.
    pub async fn entries_for_contract(&self, contract_id: ContractId) -> Vec<LedgerEntry> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect()
    }

    /// Returns a contract's entries appended after the given store sequence,
    /// together with the store's last sequence at read time.
    ///
    /// Both values come from one consistent read, so folding the tail onto a
    /// snapshot and stamping it with the returned sequence never skips or
    /// double-counts an entry.
    pub async fn contract_tail(
        &self,
        contract_id: ContractId,
        sequence: u64,
    ) -> (Vec<LedgerEntry>, u64) {
        let inner = self.inner.read().await;
        let tail = inner
            .entries
            .iter()
            .skip(usize::try_from(sequence).unwrap_or(usize::MAX))
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect();
        (tail, inner.entries.len() as u64)
    }

    /// Returns every entry in the store, in append order.
    pub async fn all_entries(&self) -> Vec<LedgerEntry> {
        let inner = self.inner.read().await;
        inner.entries.clone()
    }

    /// Returns entries dated within the inclusive range, in append order.
    pub async fn entries_in_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<LedgerEntry> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|e| e.entry_date >= from && e.entry_date <= to)
            .cloned()
            .collect()
    }

    /// Returns the store sequence of the latest entry (zero when empty).
    pub async fn last_sequence(&self) -> u64 {
        let inner = self.inner.read().await;
        inner.entries.len() as u64
    }

    /// Returns the cached snapshot for a contract, if any.
    pub async fn snapshot(&self, contract_id: ContractId) -> Option<ContractBalanceSnapshot> {
        let inner = self.inner.read().await;
        inner.snapshots.get(&contract_id).copied()
    }

    /// Installs a snapshot, guarded by an optimistic version check.
    ///
    /// `expected_version` must match the stored snapshot's version (zero when
    /// no snapshot exists yet).
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` when another writer advanced the
    /// snapshot first.
    pub async fn put_snapshot(
        &self,
        snapshot: ContractBalanceSnapshot,
        expected_version: i64,
    ) -> Result<(), PostingError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .snapshots
            .get(&snapshot.contract_id)
            .map_or(0, |s| s.version);
        if current != expected_version {
            return Err(PostingError::ConcurrentModification(snapshot.contract_id));
        }
        inner.snapshots.insert(snapshot.contract_id, snapshot);
        Ok(())
    }
}

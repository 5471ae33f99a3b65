//! Append-only audit trail of posting decisions.
//!
//! Every accepted event, suppressed duplicate, and reversal leaves a record
//! naming the actor and the entries involved. Records are never updated or
//! deleted.

use chrono::{DateTime, Utc};
use revledger_shared::types::{AuditRecordId, ContractId, EventId, LedgerEntryId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// What the posting pipeline decided for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The event was new and its entries were posted.
    Posted,
    /// An entry was offset by a reversal.
    Reversed,
    /// A re-delivered event id was suppressed without writing.
    DuplicateSuppressed,
}

/// One immutable audit trail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique identifier.
    pub id: AuditRecordId,
    /// The decision recorded.
    pub action: AuditAction,
    /// The event the decision was taken for.
    pub event_id: EventId,
    /// The contract the event applies to.
    pub contract_id: ContractId,
    /// The ledger entries written by the decision, if any.
    pub entry_ids: Vec<LedgerEntryId>,
    /// Who or what submitted the event.
    pub actor: String,
    /// When the decision was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Builds a record timestamped now.
    #[must_use]
    pub fn new(
        action: AuditAction,
        event_id: EventId,
        contract_id: ContractId,
        entry_ids: Vec<LedgerEntryId>,
        actor: &str,
    ) -> Self {
        Self {
            id: AuditRecordId::new(),
            action,
            event_id,
            contract_id,
            entry_ids,
            actor: actor.to_string(),
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only audit log.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub async fn record(&self, record: AuditRecord) {
        self.records.write().await.push(record);
    }

    /// Returns all records, in append order.
    pub async fn all(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    /// Returns the records for one contract, in append order.
    pub async fn for_contract(&self, contract_id: ContractId) -> Vec<AuditRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.contract_id == contract_id)
            .cloned()
            .collect()
    }
}

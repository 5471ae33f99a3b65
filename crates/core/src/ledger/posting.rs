//! The posting rule engine.
//!
//! This is the single authoritative mapping from business events to balanced
//! journal entries. No other component may post against AR, Revenue,
//! Contract Asset, or Contract Liability; code that needs to adjust those
//! accounts must emit an event through this engine instead.

use rust_decimal::Decimal;

use crate::contract::Contract;

use super::balance::ContractPosition;
use super::entry::LedgerEntryDraft;
use super::error::PostingError;
use super::account::Account;
use super::event::{EventKind, RevenueEvent, sort_events};

/// Pure, deterministic posting rule engine.
///
/// The decision table, by event kind and the position before the event:
///
/// | Event       | Debit                          | Credit                          |
/// |-------------|--------------------------------|---------------------------------|
/// | Billing     | AR                             | Contract Asset up to existing CA, remainder Contract Liability |
/// | Cash        | Cash                           | AR up to open AR, remainder Contract Liability (advance) |
/// | Recognition | Contract Liability up to existing CL, remainder Contract Asset | Revenue |
///
/// When an amount exceeds the available offsetting balance, the engine
/// clamps to the available balance and posts the remainder against the
/// opposite account as a second balanced entry, so no sub-balance ever goes
/// negative.
pub struct PostingEngine;

impl PostingEngine {
    /// Derives the journal-entry drafts for one event.
    ///
    /// Produces one or two drafts; zero-amount legs are dropped. Every draft
    /// debits and credits different accounts with a positive amount.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the event amount is non-positive, the
    /// event is addressed to a different contract, or the currencies differ.
    pub fn derive_postings(
        event: &RevenueEvent,
        contract: &Contract,
        position: &ContractPosition,
    ) -> Result<Vec<LedgerEntryDraft>, PostingError> {
        event.validate()?;
        if event.contract_id != contract.id {
            return Err(PostingError::UnknownContract(event.contract_id));
        }
        if event.currency != contract.currency() {
            return Err(PostingError::CurrencyMismatch {
                expected: contract.currency(),
                actual: event.currency,
            });
        }

        let amount = event.amount;
        let drafts = match event.kind {
            EventKind::Billing { .. } => {
                // Reclassify existing Contract Asset first; the remainder
                // defers as Contract Liability.
                let reclass = amount.min(position.contract_asset());
                let deferred = amount - reclass;
                Self::legs(
                    event,
                    contract,
                    &[
                        (Account::AccountsReceivable, Account::ContractAsset, reclass),
                        (Account::AccountsReceivable, Account::ContractLiability, deferred),
                    ],
                )
            }
            EventKind::Cash => {
                // Settle open AR first; the excess is an advance payment.
                let settled = amount.min(position.outstanding_receivable());
                let advance = amount - settled;
                Self::legs(
                    event,
                    contract,
                    &[
                        (Account::Cash, Account::AccountsReceivable, settled),
                        (Account::Cash, Account::ContractLiability, advance),
                    ],
                )
            }
            EventKind::Recognition { .. } => {
                // Consume existing Contract Liability first; the remainder
                // accrues as Contract Asset.
                let consumed = amount.min(position.contract_liability());
                let accrued = amount - consumed;
                Self::legs(
                    event,
                    contract,
                    &[
                        (Account::ContractLiability, Account::Revenue, consumed),
                        (Account::ContractAsset, Account::Revenue, accrued),
                    ],
                )
            }
        };

        debug_assert!(!drafts.is_empty());
        Ok(drafts)
    }

    /// Derives postings for a batch of events against one contract.
    ///
    /// Events are applied in deterministic order (timestamp, then
    /// billing < cash < recognition) and the position is folded forward
    /// between events, so each event sees the balances left by the previous
    /// one.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered; nothing is derived
    /// past a failing event.
    pub fn derive_batch(
        mut events: Vec<RevenueEvent>,
        contract: &Contract,
        opening: ContractPosition,
    ) -> Result<Vec<LedgerEntryDraft>, PostingError> {
        sort_events(&mut events);

        let mut position = opening;
        let mut drafts = Vec::with_capacity(events.len() * 2);
        for event in &events {
            drafts.extend(Self::derive_postings(event, contract, &position)?);
            position.apply(event.kind, event.amount);
        }
        Ok(drafts)
    }

    /// Materializes the non-zero legs of a decision-table row.
    fn legs(
        event: &RevenueEvent,
        contract: &Contract,
        rows: &[(Account, Account, Decimal)],
    ) -> Vec<LedgerEntryDraft> {
        rows.iter()
            .filter(|(_, _, amount)| *amount > Decimal::ZERO)
            .map(|&(debit, credit, amount)| LedgerEntryDraft {
                tenant_id: contract.tenant_id,
                contract_id: contract.id,
                performance_obligation_id: event.kind.performance_obligation_id(),
                event_id: event.event_id,
                entry_date: event.occurred_at.date_naive(),
                debit_account: debit,
                credit_account: credit,
                amount,
                currency: event.currency,
                memo: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use revledger_shared::types::{
        ContractId, Currency, EventId, Money, PerformanceObligationId, TenantId,
    };
    use rust_decimal_macros::dec;

    fn contract() -> Contract {
        Contract {
            id: ContractId::new(),
            tenant_id: TenantId::new(),
            total_value: Money::new(dec!(12000), Currency::Usd),
        }
    }

    fn at() -> DateTime<Utc> {
        "2025-01-15T10:00:00Z".parse().unwrap()
    }

    fn billing(contract: &Contract, amount: Decimal) -> RevenueEvent {
        RevenueEvent {
            event_id: EventId::new(),
            contract_id: contract.id,
            amount,
            currency: contract.currency(),
            occurred_at: at(),
            kind: EventKind::Billing {
                performance_obligation_id: None,
            },
        }
    }

    fn cash(contract: &Contract, amount: Decimal) -> RevenueEvent {
        RevenueEvent {
            event_id: EventId::new(),
            contract_id: contract.id,
            amount,
            currency: contract.currency(),
            occurred_at: at(),
            kind: EventKind::Cash,
        }
    }

    fn recognition(contract: &Contract, amount: Decimal) -> RevenueEvent {
        RevenueEvent {
            event_id: EventId::new(),
            contract_id: contract.id,
            amount,
            currency: contract.currency(),
            occurred_at: at(),
            kind: EventKind::Recognition {
                performance_obligation_id: PerformanceObligationId::new(),
            },
        }
    }

    #[test]
    fn test_billing_with_no_prior_balance_defers_to_liability() {
        let contract = contract();
        let drafts = PostingEngine::derive_postings(
            &billing(&contract, dec!(1000)),
            &contract,
            &ContractPosition::ZERO,
        )
        .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].debit_account, Account::AccountsReceivable);
        assert_eq!(drafts[0].credit_account, Account::ContractLiability);
        assert_eq!(drafts[0].amount, dec!(1000));
    }

    #[test]
    fn test_billing_reclassifies_existing_contract_asset() {
        // Prior Contract Asset of 1000 (recognized, unbilled); billing the
        // same amount reclassifies it, no new liability.
        let contract = contract();
        let position = ContractPosition {
            billed: dec!(0),
            cash_received: dec!(0),
            recognized: dec!(1000),
        };

        let drafts =
            PostingEngine::derive_postings(&billing(&contract, dec!(1000)), &contract, &position)
                .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].debit_account, Account::AccountsReceivable);
        assert_eq!(drafts[0].credit_account, Account::ContractAsset);
        assert_eq!(drafts[0].amount, dec!(1000));
    }

    #[test]
    fn test_billing_splits_when_exceeding_contract_asset() {
        let contract = contract();
        let position = ContractPosition {
            billed: dec!(0),
            cash_received: dec!(0),
            recognized: dec!(80),
        };

        let drafts =
            PostingEngine::derive_postings(&billing(&contract, dec!(100)), &contract, &position)
                .unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].credit_account, Account::ContractAsset);
        assert_eq!(drafts[0].amount, dec!(80));
        assert_eq!(drafts[1].credit_account, Account::ContractLiability);
        assert_eq!(drafts[1].amount, dec!(20));
    }

    #[test]
    fn test_cash_settles_open_receivable() {
        let contract = contract();
        let position = ContractPosition {
            billed: dec!(1000),
            cash_received: dec!(0),
            recognized: dec!(0),
        };

        let drafts =
            PostingEngine::derive_postings(&cash(&contract, dec!(1000)), &contract, &position)
                .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].debit_account, Account::Cash);
        assert_eq!(drafts[0].credit_account, Account::AccountsReceivable);
    }

    #[test]
    fn test_cash_splits_advance_payment() {
        // Cash 1500 against open AR 1000: settle 1000, defer 500.
        let contract = contract();
        let position = ContractPosition {
            billed: dec!(1000),
            cash_received: dec!(0),
            recognized: dec!(0),
        };

        let drafts =
            PostingEngine::derive_postings(&cash(&contract, dec!(1500)), &contract, &position)
                .unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].credit_account, Account::AccountsReceivable);
        assert_eq!(drafts[0].amount, dec!(1000));
        assert_eq!(drafts[1].credit_account, Account::ContractLiability);
        assert_eq!(drafts[1].amount, dec!(500));
    }

    #[test]
    fn test_cash_with_no_billing_is_all_advance() {
        let contract = contract();
        let drafts = PostingEngine::derive_postings(
            &cash(&contract, dec!(50)),
            &contract,
            &ContractPosition::ZERO,
        )
        .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].debit_account, Account::Cash);
        assert_eq!(drafts[0].credit_account, Account::ContractLiability);
    }

    #[test]
    fn test_recognition_consumes_contract_liability() {
        // Liability 1200, recognize 500: Dr CL 500 / Cr Revenue 500.
        let contract = contract();
        let position = ContractPosition {
            billed: dec!(1200),
            cash_received: dec!(0),
            recognized: dec!(0),
        };

        let drafts = PostingEngine::derive_postings(
            &recognition(&contract, dec!(500)),
            &contract,
            &position,
        )
        .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].debit_account, Account::ContractLiability);
        assert_eq!(drafts[0].credit_account, Account::Revenue);
        assert_eq!(drafts[0].amount, dec!(500));

        let mut after = position;
        after.apply(
            EventKind::Recognition {
                performance_obligation_id: PerformanceObligationId::new(),
            },
            dec!(500),
        );
        assert_eq!(after.contract_liability(), dec!(700));
    }

    #[test]
    fn test_recognition_splits_when_exceeding_liability() {
        let contract = contract();
        let position = ContractPosition {
            billed: dec!(100),
            cash_received: dec!(0),
            recognized: dec!(0),
        };

        let drafts = PostingEngine::derive_postings(
            &recognition(&contract, dec!(120)),
            &contract,
            &position,
        )
        .unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].debit_account, Account::ContractLiability);
        assert_eq!(drafts[0].amount, dec!(100));
        assert_eq!(drafts[1].debit_account, Account::ContractAsset);
        assert_eq!(drafts[1].amount, dec!(20));
        assert!(drafts.iter().all(|d| d.credit_account == Account::Revenue));
    }

    #[test]
    fn test_recognition_with_no_billing_accrues_contract_asset() {
        let contract = contract();
        let drafts = PostingEngine::derive_postings(
            &recognition(&contract, dec!(30)),
            &contract,
            &ContractPosition::ZERO,
        )
        .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].debit_account, Account::ContractAsset);
        assert_eq!(drafts[0].credit_account, Account::Revenue);
    }

    #[test]
    fn test_rejects_currency_mismatch() {
        let contract = contract();
        let mut event = billing(&contract, dec!(100));
        event.currency = Currency::Eur;

        let result = PostingEngine::derive_postings(&event, &contract, &ContractPosition::ZERO);
        assert!(matches!(result, Err(PostingError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_rejects_foreign_contract_event() {
        let contract = contract();
        let other = self::contract();
        let event = billing(&other, dec!(100));

        let result = PostingEngine::derive_postings(&event, &contract, &ContractPosition::ZERO);
        assert!(matches!(result, Err(PostingError::UnknownContract(_))));
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let contract = contract();
        let event = billing(&contract, dec!(0));

        let result = PostingEngine::derive_postings(&event, &contract, &ContractPosition::ZERO);
        assert!(matches!(result, Err(PostingError::NonPositiveAmount { .. })));
    }

    #[test]
    fn test_obligation_reference_flows_into_drafts() {
        let contract = contract();
        let po = PerformanceObligationId::new();
        let event = RevenueEvent {
            event_id: EventId::new(),
            contract_id: contract.id,
            amount: dec!(10),
            currency: contract.currency(),
            occurred_at: at(),
            kind: EventKind::Recognition {
                performance_obligation_id: po,
            },
        };

        let drafts =
            PostingEngine::derive_postings(&event, &contract, &ContractPosition::ZERO).unwrap();
        assert!(drafts.iter().all(|d| d.performance_obligation_id == Some(po)));
    }

    #[test]
    fn test_batch_folds_position_between_events() {
        // Recognize 80, then bill 100: the billing must see the contract
        // asset left by the recognition and split 80/20.
        let contract = contract();
        let mut rec = recognition(&contract, dec!(80));
        rec.occurred_at = "2025-01-10T00:00:00Z".parse().unwrap();
        let mut bill = billing(&contract, dec!(100));
        bill.occurred_at = "2025-01-20T00:00:00Z".parse().unwrap();

        // Deliberately out of order; the batch sorts deterministically.
        let drafts =
            PostingEngine::derive_batch(vec![bill, rec], &contract, ContractPosition::ZERO)
                .unwrap();

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].debit_account, Account::ContractAsset);
        assert_eq!(drafts[1].credit_account, Account::ContractAsset);
        assert_eq!(drafts[1].amount, dec!(80));
        assert_eq!(drafts[2].credit_account, Account::ContractLiability);
        assert_eq!(drafts[2].amount, dec!(20));
    }

    #[test]
    fn test_every_draft_is_well_formed() {
        let contract = contract();
        let events = vec![
            billing(&contract, dec!(100)),
            cash(&contract, dec!(150)),
            recognition(&contract, dec!(120)),
        ];

        let drafts =
            PostingEngine::derive_batch(events, &contract, ContractPosition::ZERO).unwrap();

        for draft in &drafts {
            assert_ne!(draft.debit_account, draft.credit_account);
            assert!(draft.amount > Decimal::ZERO);
        }
    }
}

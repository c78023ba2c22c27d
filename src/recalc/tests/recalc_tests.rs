use chrono::Utc;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use crate::engine::Caller;
use crate::recalc::Drift;
use crate::recalc::RecalcError;
use crate::recalc::recompute_entity;
use crate::recalc::recompute_touched;
use crate::recalc::register_balance;
use crate::recalc::repair_all;
use crate::store::InMemoryStore;
use crate::store::LedgerStore;
use crate::test_fixtures::*;
use crate::transfer::EntityRef;
use crate::transfer::Transfer;
use crate::transfer::TransferDraft;
use crate::transfer::TransferType;
use crate::validation::ValidationContext;
use crate::validation::validate_and_normalize;

/// Inserts the rows without touching any aggregate.
fn insert_raw(store: &InMemoryStore, drafts: &[TransferDraft]) -> Vec<Transfer> {
    let context = ValidationContext::create(&Caller::admin(ADMIN_ID));
    store
        .transaction(|tx| {
            drafts
                .iter()
                .map(|draft| {
                    let normalized = validate_and_normalize(draft, &context).unwrap();
                    tx.insert_transfer(normalized, Utc::now())
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .unwrap()
}

fn recompute(store: &InMemoryStore, entity: EntityRef) -> Decimal {
    store.transaction(|tx| recompute_entity(tx, entity)).unwrap()
}

#[test]
fn register_balance_adds_deposits_and_subtracts_outflows() {
    let store = seeded_store();
    insert_raw(
        &store,
        &[
            company_funding(MAIN, "100"),
            investment_expense(MAIN, HOUSE, "30"),
            account_funding(WORKER, MAIN, "20"),
            register_transfer(MAIN, SITE, "15.50"),
            employee_expense(WORKER, Some(HOUSE), None, "999"),
        ],
    );

    assert_eq!(recompute(&store, EntityRef::Register(MAIN)), dec("34.50"));
    assert_eq!(recompute(&store, EntityRef::Register(SITE)), dec("15.50"));
}

#[test]
fn investment_total_costs_counts_only_cost_types() {
    let store = seeded_store();
    let mut stage_settlement = company_funding(MAIN, "1000");
    stage_settlement.transfer_type = TransferType::StageSettlement;
    stage_settlement.investment = Some(HOUSE);
    insert_raw(
        &store,
        &[
            stage_settlement,
            investment_expense(MAIN, HOUSE, "30"),
            employee_expense(WORKER, Some(HOUSE), None, "12.25"),
            investment_expense(MAIN, BRIDGE, "7"),
        ],
    );

    assert_eq!(recompute(&store, EntityRef::Investment(HOUSE)), dec("42.25"));
    assert_eq!(recompute(&store, EntityRef::Investment(BRIDGE)), dec("7"));
}

#[test]
fn recompute_entity_is_idempotent() {
    let store = seeded_store();
    insert_raw(&store, &[company_funding(MAIN, "80"), investment_expense(MAIN, HOUSE, "25")]);

    for entity in [EntityRef::Register(MAIN), EntityRef::Investment(HOUSE)] {
        let first = recompute(&store, entity);
        let second = recompute(&store, entity);
        assert_eq!(first, second, "entity={entity}");
    }
}

#[test]
fn recompute_touched_refreshes_previous_and_current_owners() {
    let store = seeded_store();
    let [expense] = insert_raw(&store, &[investment_expense(MAIN, HOUSE, "25")])
        .try_into()
        .unwrap();
    store
        .transaction(|tx| recompute_touched(tx, None, Some(&expense)))
        .unwrap();
    assert_eq!(store.transaction(|tx| tx.investment(HOUSE)).unwrap().unwrap().total_costs, dec("25"));

    let mut moved = expense.clone();
    moved.investment = Some(BRIDGE);
    moved.source_register = Some(SITE);
    let recomputed = store
        .transaction(|tx| {
            tx.update_transfer(&moved)?;
            recompute_touched(tx, Some(&expense), Some(&moved))
        })
        .unwrap();

    assert_eq!(
        recomputed,
        vec![
            (EntityRef::Register(MAIN), Decimal::ZERO),
            (EntityRef::Register(SITE), dec("-25")),
            (EntityRef::Investment(HOUSE), Decimal::ZERO),
            (EntityRef::Investment(BRIDGE), dec("25")),
        ]
    );
}

#[test]
fn repair_all_reports_drifted_entities_then_nothing() {
    let store = seeded_store();
    insert_raw(&store, &[company_funding(MAIN, "100"), investment_expense(SITE, BRIDGE, "40")]);
    store
        .transaction(|tx| recompute_entity(tx, EntityRef::Register(MAIN)))
        .unwrap();

    let drifts = store.transaction(|tx| repair_all(tx)).unwrap();
    assert_eq!(
        drifts,
        vec![
            Drift {
                entity: EntityRef::Register(SITE),
                before: Decimal::ZERO,
                after: dec("-40"),
            },
            Drift {
                entity: EntityRef::Investment(BRIDGE),
                before: Decimal::ZERO,
                after: dec("40"),
            },
        ]
    );

    assert_eq!(store.transaction(|tx| repair_all(tx)).unwrap(), vec![]);
}

#[test]
fn recompute_of_an_unknown_register_fails() {
    let store = seeded_store();
    let res = store.transaction(|tx| recompute_entity(tx, EntityRef::Register(UNKNOWN_REGISTER)));
    assert2::let_assert!(Err(RecalcError::Store(_)) = res);
}

#[test]
fn register_balance_does_not_persist() {
    let store = seeded_store();
    insert_raw(&store, &[company_funding(MAIN, "5")]);

    let computed = store.transaction(|tx| register_balance(tx, MAIN)).unwrap();
    let stored = store.transaction(|tx| tx.cash_register(MAIN)).unwrap().unwrap().balance;

    assert_eq!(computed, dec("5"));
    assert_eq!(stored, Decimal::ZERO);
}

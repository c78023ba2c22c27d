//! Balance Recalculation Engine.
//!
//! Cash register balances and investment total costs are never adjusted incrementally: each
//! recomputation aggregates every transfer currently referencing the entity and overwrites the
//! stored value. Running it twice yields the same result, and a drifted value is healed by the
//! next write touching the entity (or by [`repair_all`]).
//!
//! Sign convention for a register:
//! - deposit-classified types ([`TransferType::is_deposit`]) add to their source register;
//! - every other type carrying a source register subtracts from it;
//! - [`TransferType::RegisterTransfer`] additionally adds to its target register.
//!
//! An investment's total costs is the plain sum of its cost-classified transfers
//! ([`TransferType::is_cost`]).

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use tracing::debug;
use tracing::warn;

use crate::store::AggregateQuery;
use crate::store::LedgerTx;
use crate::store::Owner;
use crate::store::StoreError;
use crate::transfer::EntityRef;
use crate::transfer::InvestmentId;
use crate::transfer::RegisterId;
use crate::transfer::Transfer;
use crate::transfer::TransferType;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecalcError {
    #[error("overflow while aggregating {entity}")]
    Overflow { entity: EntityRef },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An entity whose stored aggregate differed from its recomputed value.
#[derive(Debug, Clone, PartialEq, Eq, parse_display::Display)]
#[display("{entity} before={before} after={after}")]
pub struct Drift {
    pub entity: EntityRef,
    pub before: Decimal,
    pub after: Decimal,
}

/// Recomputes and persists the aggregate owned by `entity`, returning the new value.
///
/// # Errors
///
/// Returns an error if:
/// - The aggregate query or the write fails ([`RecalcError::Store`]).
/// - Combining the partial sums overflows ([`RecalcError::Overflow`]).
pub fn recompute_entity(tx: &mut dyn LedgerTx, entity: EntityRef) -> Result<Decimal, RecalcError> {
    let value = match entity {
        EntityRef::Register(id) => {
            let balance = register_balance(tx, id)?;
            tx.set_register_balance(id, balance)?;
            balance
        }
        EntityRef::Investment(id) => {
            let total_costs = investment_total_costs(tx, id)?;
            tx.set_investment_total_costs(id, total_costs)?;
            total_costs
        }
    };
    debug!(%entity, %value, "aggregate recomputed");
    Ok(value)
}

/// Recomputes every entity referenced by the previous and/or the current version of a row.
///
/// Pass `previous` on update and delete, `current` on create and update. An update that moves a
/// transfer to another register or investment therefore refreshes both the old and the new owner.
///
/// # Errors
///
/// Returns the first [`RecalcError`] encountered; callers abort the surrounding transaction.
pub fn recompute_touched(
    tx: &mut dyn LedgerTx,
    previous: Option<&Transfer>,
    current: Option<&Transfer>,
) -> Result<Vec<(EntityRef, Decimal)>, RecalcError> {
    let touched: BTreeSet<EntityRef> = previous
        .into_iter()
        .chain(current)
        .flat_map(Transfer::references)
        .collect();

    touched
        .into_iter()
        .map(|entity| recompute_entity(tx, entity).map(|value| (entity, value)))
        .collect()
}

/// Recomputes every register and investment, reporting the ones that were out of sync.
///
/// # Errors
///
/// Returns the first [`RecalcError`] encountered.
pub fn repair_all(tx: &mut dyn LedgerTx) -> Result<Vec<Drift>, RecalcError> {
    let registers = tx
        .cash_registers()?
        .into_iter()
        .map(|register| (EntityRef::Register(register.id), register.balance));
    let investments = tx
        .investments()?
        .into_iter()
        .map(|investment| (EntityRef::Investment(investment.id), investment.total_costs));
    let stored: Vec<(EntityRef, Decimal)> = registers.chain(investments).collect();

    let mut drifts = Vec::new();
    for (entity, before) in stored {
        let after = recompute_entity(tx, entity)?;
        if after != before {
            warn!(%entity, %before, %after, "aggregate was out of sync");
            drifts.push(Drift { entity, before, after });
        }
    }
    Ok(drifts)
}

/// Signed sum of every transfer referencing register `id`, without persisting it.
///
/// # Errors
///
/// Same as [`recompute_entity`].
pub fn register_balance(tx: &dyn LedgerTx, id: RegisterId) -> Result<Decimal, RecalcError> {
    let entity = EntityRef::Register(id);
    let deposits = tx.sum_amounts(&AggregateQuery::new(
        TransferType::deposit_types(),
        Owner::SourceRegister(id),
    ))?;
    let incoming = tx.sum_amounts(&AggregateQuery::new(
        [TransferType::RegisterTransfer],
        Owner::TargetRegister(id),
    ))?;
    let outflows = tx.sum_amounts(&AggregateQuery::new(
        TransferType::outflow_types(),
        Owner::SourceRegister(id),
    ))?;

    deposits
        .checked_add(incoming)
        .and_then(|inflows| inflows.checked_sub(outflows))
        .map(|balance| balance.normalize())
        .ok_or(RecalcError::Overflow { entity })
}

/// Sum of every cost-classified transfer referencing investment `id`, without persisting it.
///
/// # Errors
///
/// Returns an error if the aggregate query fails.
pub fn investment_total_costs(tx: &dyn LedgerTx, id: InvestmentId) -> Result<Decimal, RecalcError> {
    let costs = tx.sum_amounts(&AggregateQuery::new(TransferType::cost_types(), Owner::Investment(id)))?;
    Ok(costs.normalize())
}

#[cfg(test)]
#[path = "recalc/tests/recalc_tests.rs"]
mod recalc_tests;

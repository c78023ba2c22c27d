//! Worker saldo: the net of what a worker received (account funding) and what they spent
//! (employee expenses).
//!
//! Saldo is never materialized. It has no single owning row that transfers from several
//! registers could update safely, so it is aggregated on every read.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::store::AggregateQuery;
use crate::store::DateRange;
use crate::store::LedgerTx;
use crate::store::Owner;
use crate::store::StoreError;
use crate::transfer::TransferType;
use crate::transfer::WorkerId;

fn additions() -> Vec<TransferType> {
    TransferType::ALL
        .into_iter()
        .filter(|t| t.worker_saldo_sign() > 0)
        .collect()
}

fn subtractions() -> Vec<TransferType> {
    TransferType::ALL
        .into_iter()
        .filter(|t| t.worker_saldo_sign() < 0)
        .collect()
}

/// Saldo of a single worker, `0` when the worker has no transfers.
///
/// # Errors
///
/// Returns an error if an aggregate query fails.
pub fn worker_saldo(tx: &dyn LedgerTx, worker: WorkerId, range: Option<DateRange>) -> Result<Decimal, StoreError> {
    let added = tx.sum_amounts(&AggregateQuery::new(additions(), Owner::Worker(worker)).within(range))?;
    let spent = tx.sum_amounts(&AggregateQuery::new(subtractions(), Owner::Worker(worker)).within(range))?;
    // Both sums are non negative, their difference cannot overflow.
    Ok((added - spent).normalize())
}

/// Saldo of every known worker, computed with one grouped aggregate per sign.
///
/// # Errors
///
/// Returns an error if an aggregate query fails.
pub fn worker_saldos(tx: &dyn LedgerTx, range: Option<DateRange>) -> Result<BTreeMap<WorkerId, Decimal>, StoreError> {
    let added = tx.sum_amounts_by_worker(&additions(), range.as_ref())?;
    let spent = tx.sum_amounts_by_worker(&subtractions(), range.as_ref())?;

    Ok(tx
        .workers()?
        .into_iter()
        .map(|worker| {
            let added = added.get(&worker.id).copied().unwrap_or_default();
            let spent = spent.get(&worker.id).copied().unwrap_or_default();
            (worker.id, (added - spent).normalize())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::InMemoryStore;
    use crate::store::LedgerStore;
    use crate::transfer::InvestmentId;
    use crate::transfer::NormalizedTransfer;
    use crate::transfer::PaymentMethod;
    use crate::transfer::PositiveAmount;
    use crate::transfer::RegisterId;
    use crate::transfer::UserId;
    use crate::transfer::Worker;

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn row(transfer_type: TransferType, worker: u32, amount: i64, date: NaiveDate) -> NormalizedTransfer {
        let employee_expense = transfer_type == TransferType::EmployeeExpense;
        NormalizedTransfer {
            description: "row".into(),
            amount: PositiveAmount::try_from(Decimal::from(amount)).unwrap(),
            date,
            transfer_type,
            payment_method: PaymentMethod::Cash,
            source_register: (!employee_expense).then_some(RegisterId(1)),
            target_register: None,
            investment: employee_expense.then_some(InvestmentId(1)),
            worker: Some(WorkerId(worker)),
            other_category: None,
            category_description: None,
            evidence: None,
            invoice_note: None,
            creator: UserId(1),
        }
    }

    fn store_with(rows: Vec<NormalizedTransfer>) -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .transaction(|tx| {
                for id in 1..=3 {
                    tx.insert_worker(Worker {
                        id: WorkerId(id),
                        name: format!("worker {id}"),
                        role: "mason".into(),
                    })?;
                }
                for row in rows {
                    tx.insert_transfer(row, Utc::now())?;
                }
                Ok::<_, StoreError>(())
            })
            .unwrap();
        store
    }

    #[test]
    fn worker_saldo_is_zero_without_transfers() {
        let store = store_with(vec![]);
        assert_eq!(
            store.transaction(|tx| worker_saldo(tx, WorkerId(1), None)).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn worker_saldo_nets_advances_against_expenses() {
        let store = store_with(vec![
            row(TransferType::AccountFunding, 1, 500, day(1)),
            row(TransferType::EmployeeExpense, 1, 120, day(2)),
            row(TransferType::AccountFunding, 1, 100, day(3)),
            row(TransferType::EmployeeExpense, 1, 30, day(4)),
            row(TransferType::AccountFunding, 2, 999, day(1)),
        ]);
        assert_eq!(
            store.transaction(|tx| worker_saldo(tx, WorkerId(1), None)).unwrap(),
            Decimal::from(450)
        );
    }

    #[test]
    fn worker_saldo_honors_the_date_range() {
        let store = store_with(vec![
            row(TransferType::AccountFunding, 1, 500, day(1)),
            row(TransferType::EmployeeExpense, 1, 120, day(10)),
            row(TransferType::EmployeeExpense, 1, 80, day(20)),
        ]);
        let range = DateRange {
            from: Some(day(5)),
            to: Some(day(15)),
        };
        assert_eq!(
            store.transaction(|tx| worker_saldo(tx, WorkerId(1), Some(range))).unwrap(),
            Decimal::from(-120)
        );
    }

    #[test]
    fn worker_saldos_covers_every_worker_and_matches_the_single_query() {
        let store = store_with(vec![
            row(TransferType::AccountFunding, 1, 500, day(1)),
            row(TransferType::EmployeeExpense, 1, 120, day(2)),
            row(TransferType::EmployeeExpense, 2, 40, day(2)),
        ]);

        let saldos = store.transaction(|tx| worker_saldos(tx, None)).unwrap();
        assert_eq!(
            saldos,
            BTreeMap::from([
                (WorkerId(1), Decimal::from(380)),
                (WorkerId(2), Decimal::from(-40)),
                (WorkerId(3), Decimal::ZERO),
            ])
        );
        for (worker, saldo) in saldos {
            assert_eq!(store.transaction(|tx| worker_saldo(tx, worker, None)).unwrap(), saldo);
        }
    }
}

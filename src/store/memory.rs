use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::store::AggregateQuery;
use crate::store::DateRange;
use crate::store::LedgerStore;
use crate::store::LedgerTx;
use crate::store::StoreError;
use crate::transfer::CashRegister;
use crate::transfer::Investment;
use crate::transfer::InvestmentId;
use crate::transfer::NormalizedTransfer;
use crate::transfer::OtherCategory;
use crate::transfer::OtherCategoryId;
use crate::transfer::RegisterId;
use crate::transfer::Transfer;
use crate::transfer::TransferId;
use crate::transfer::TransferType;
use crate::transfer::Worker;
use crate::transfer::WorkerId;

/// Store keeping every table in memory.
///
/// Transactions are serialized by a single lock and run against a copy of the committed state,
/// which is swapped in only when the closure succeeds.
///
/// Tables are shared copy-on-write: starting a transaction is O(number of tables) and read-only
/// transactions copy nothing, but the first write to a table inside a transaction copies that whole
/// table. A transfer write touches the transfers, registers and investments tables, so each write
/// costs O(rows in those tables) and an N-line settlement O(N·rows). Fine for an in-process ledger;
/// a store backed by a database does not pay this.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    committed: Mutex<Tables>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    transfers: Arc<BTreeMap<TransferId, Transfer>>,
    last_transfer_id: u32,
    registers: Arc<BTreeMap<RegisterId, CashRegister>>,
    investments: Arc<BTreeMap<InvestmentId, Investment>>,
    workers: Arc<BTreeMap<WorkerId, Worker>>,
    other_categories: Arc<BTreeMap<OtherCategoryId, OtherCategory>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryStore {
    fn transaction<T, E>(&self, f: impl FnOnce(&mut dyn LedgerTx) -> Result<T, E>) -> Result<T, E> {
        let mut committed = self.committed.lock();
        let mut working = committed.clone();
        let out = f(&mut working)?;
        *committed = working;
        Ok(out)
    }
}

fn insert_new<K: Ord + std::fmt::Display, V>(table: &mut BTreeMap<K, V>, key: K, value: V) -> Result<(), StoreError> {
    match table.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        }
        Entry::Occupied(entry) => Err(StoreError::Duplicate {
            entity: entry.key().to_string(),
        }),
    }
}

impl LedgerTx for Tables {
    fn transfer(&self, id: TransferId) -> Result<Option<Transfer>, StoreError> {
        Ok(self.transfers.get(&id).cloned())
    }

    fn insert_transfer(&mut self, normalized: NormalizedTransfer, now: DateTime<Utc>) -> Result<Transfer, StoreError> {
        let next = self
            .last_transfer_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("transfer id sequence exhausted".into()))?;
        let transfer = Transfer::from_normalized(TransferId(next), normalized, now);
        insert_new(Arc::make_mut(&mut self.transfers), transfer.id, transfer.clone())?;
        self.last_transfer_id = next;
        Ok(transfer)
    }

    fn update_transfer(&mut self, transfer: &Transfer) -> Result<(), StoreError> {
        let row = Arc::make_mut(&mut self.transfers)
            .get_mut(&transfer.id)
            .ok_or_else(|| StoreError::not_found(format!("transfer={}", transfer.id)))?;
        *row = transfer.clone();
        Ok(())
    }

    fn delete_transfer(&mut self, id: TransferId) -> Result<Option<Transfer>, StoreError> {
        Ok(Arc::make_mut(&mut self.transfers).remove(&id))
    }

    fn cash_register(&self, id: RegisterId) -> Result<Option<CashRegister>, StoreError> {
        Ok(self.registers.get(&id).cloned())
    }

    fn cash_registers(&self) -> Result<Vec<CashRegister>, StoreError> {
        Ok(self.registers.values().cloned().collect())
    }

    fn set_register_balance(&mut self, id: RegisterId, balance: Decimal) -> Result<(), StoreError> {
        let register = Arc::make_mut(&mut self.registers)
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("register={id}")))?;
        register.balance = balance;
        Ok(())
    }

    fn investment(&self, id: InvestmentId) -> Result<Option<Investment>, StoreError> {
        Ok(self.investments.get(&id).cloned())
    }

    fn investments(&self) -> Result<Vec<Investment>, StoreError> {
        Ok(self.investments.values().cloned().collect())
    }

    fn set_investment_total_costs(&mut self, id: InvestmentId, total_costs: Decimal) -> Result<(), StoreError> {
        let investment = Arc::make_mut(&mut self.investments)
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("investment={id}")))?;
        investment.total_costs = total_costs;
        Ok(())
    }

    fn worker(&self, id: WorkerId) -> Result<Option<Worker>, StoreError> {
        Ok(self.workers.get(&id).cloned())
    }

    fn workers(&self) -> Result<Vec<Worker>, StoreError> {
        Ok(self.workers.values().cloned().collect())
    }

    fn other_category(&self, id: OtherCategoryId) -> Result<Option<OtherCategory>, StoreError> {
        Ok(self.other_categories.get(&id).cloned())
    }

    fn sum_amounts(&self, query: &AggregateQuery) -> Result<Decimal, StoreError> {
        self.transfers
            .values()
            .filter(|transfer| query.matches(transfer))
            .try_fold(Decimal::ZERO, |sum, transfer| sum.checked_add(transfer.amount.as_inner()))
            .ok_or_else(|| StoreError::Backend(format!("sum overflow owner={:?}", query.owner)))
    }

    fn sum_amounts_by_worker(
        &self,
        types: &[TransferType],
        range: Option<&DateRange>,
    ) -> Result<BTreeMap<WorkerId, Decimal>, StoreError> {
        let mut sums = BTreeMap::new();
        let matching = self.transfers.values().filter(|transfer| {
            types.contains(&transfer.transfer_type) && range.is_none_or(|range| range.contains(transfer.date))
        });
        for transfer in matching {
            if let Some(worker) = transfer.worker {
                let sum = sums.entry(worker).or_insert(Decimal::ZERO);
                *sum = sum
                    .checked_add(transfer.amount.as_inner())
                    .ok_or_else(|| StoreError::Backend(format!("sum overflow worker={worker}")))?;
            }
        }
        Ok(sums)
    }

    fn insert_cash_register(&mut self, register: CashRegister) -> Result<(), StoreError> {
        insert_new(Arc::make_mut(&mut self.registers), register.id, register)
    }

    fn insert_investment(&mut self, investment: Investment) -> Result<(), StoreError> {
        insert_new(Arc::make_mut(&mut self.investments), investment.id, investment)
    }

    fn insert_worker(&mut self, worker: Worker) -> Result<(), StoreError> {
        insert_new(Arc::make_mut(&mut self.workers), worker.id, worker)
    }

    fn insert_other_category(&mut self, category: OtherCategory) -> Result<(), StoreError> {
        insert_new(Arc::make_mut(&mut self.other_categories), category.id, category)
    }
}

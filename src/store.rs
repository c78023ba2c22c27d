//! Persistence seam of the ledger.
//!
//! Every read and write happens inside [`LedgerStore::transaction`]: the closure receives a
//! [`LedgerTx`] and its writes become visible to other callers only if it returns `Ok`.
//! [`memory::InMemoryStore`] is the shipped implementation.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use rust_decimal::Decimal;

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

pub mod memory;

pub use memory::InMemoryStore;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found entity={entity}")]
    NotFound { entity: String },
    #[error("duplicate record entity={entity}")]
    Duplicate { entity: String },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
        }
    }
}

/// Inclusive date bounds, either side optional.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| from <= date) && self.to.is_none_or(|to| date <= to)
    }
}

/// The owning reference an aggregate is filtered on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Owner {
    SourceRegister(RegisterId),
    TargetRegister(RegisterId),
    Investment(InvestmentId),
    Worker(WorkerId),
}

impl Owner {
    pub fn owns(&self, transfer: &Transfer) -> bool {
        match *self {
            Self::SourceRegister(id) => transfer.source_register == Some(id),
            Self::TargetRegister(id) => transfer.target_register == Some(id),
            Self::Investment(id) => transfer.investment == Some(id),
            Self::Worker(id) => transfer.worker == Some(id),
        }
    }
}

/// `SUM(amount)` over the transfers of `types` referencing `owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    pub types: Vec<TransferType>,
    pub owner: Owner,
    pub range: Option<DateRange>,
}

impl AggregateQuery {
    pub fn new(types: impl IntoIterator<Item = TransferType>, owner: Owner) -> Self {
        Self {
            types: types.into_iter().collect(),
            owner,
            range: None,
        }
    }

    pub const fn within(mut self, range: Option<DateRange>) -> Self {
        self.range = range;
        self
    }

    pub fn matches(&self, transfer: &Transfer) -> bool {
        self.types.contains(&transfer.transfer_type)
            && self.owner.owns(transfer)
            && self.range.is_none_or(|range| range.contains(transfer.date))
    }
}

/// Operations available inside a store transaction.
pub trait LedgerTx {
    fn transfer(&self, id: TransferId) -> Result<Option<Transfer>, StoreError>;

    /// Persists a new row, assigning its id.
    fn insert_transfer(&mut self, normalized: NormalizedTransfer, now: DateTime<Utc>) -> Result<Transfer, StoreError>;

    fn update_transfer(&mut self, transfer: &Transfer) -> Result<(), StoreError>;

    /// Removes the row, returning it when it existed.
    fn delete_transfer(&mut self, id: TransferId) -> Result<Option<Transfer>, StoreError>;

    fn cash_register(&self, id: RegisterId) -> Result<Option<CashRegister>, StoreError>;

    fn cash_registers(&self) -> Result<Vec<CashRegister>, StoreError>;

    fn set_register_balance(&mut self, id: RegisterId, balance: Decimal) -> Result<(), StoreError>;

    fn investment(&self, id: InvestmentId) -> Result<Option<Investment>, StoreError>;

    fn investments(&self) -> Result<Vec<Investment>, StoreError>;

    fn set_investment_total_costs(&mut self, id: InvestmentId, total_costs: Decimal) -> Result<(), StoreError>;

    fn worker(&self, id: WorkerId) -> Result<Option<Worker>, StoreError>;

    fn workers(&self) -> Result<Vec<Worker>, StoreError>;

    fn other_category(&self, id: OtherCategoryId) -> Result<Option<OtherCategory>, StoreError>;

    fn sum_amounts(&self, query: &AggregateQuery) -> Result<Decimal, StoreError>;

    /// One grouped aggregate over every worker referenced by transfers of `types`.
    fn sum_amounts_by_worker(
        &self,
        types: &[TransferType],
        range: Option<&DateRange>,
    ) -> Result<BTreeMap<WorkerId, Decimal>, StoreError>;

    fn insert_cash_register(&mut self, register: CashRegister) -> Result<(), StoreError>;

    fn insert_investment(&mut self, investment: Investment) -> Result<(), StoreError>;

    fn insert_worker(&mut self, worker: Worker) -> Result<(), StoreError>;

    fn insert_other_category(&mut self, category: OtherCategory) -> Result<(), StoreError>;
}

pub trait LedgerStore {
    /// Runs `f` atomically. Writes are committed only if `f` returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    fn transaction<T, E>(&self, f: impl FnOnce(&mut dyn LedgerTx) -> Result<T, E>) -> Result<T, E>;
}

impl<S: LedgerStore> LedgerStore for &S {
    fn transaction<T, E>(&self, f: impl FnOnce(&mut dyn LedgerTx) -> Result<T, E>) -> Result<T, E> {
        (**self).transaction(f)
    }
}

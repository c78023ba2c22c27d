//! Seeded ledger and draft builders shared by the unit tests.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::engine::Caller;
use crate::engine::Ledger;
use crate::store::InMemoryStore;
use crate::store::LedgerStore;
use crate::store::StoreError;
use crate::transfer::CashRegister;
use crate::transfer::Investment;
use crate::transfer::InvestmentId;
use crate::transfer::InvestmentStatus;
use crate::transfer::OtherCategory;
use crate::transfer::OtherCategoryId;
use crate::transfer::PaymentMethod;
use crate::transfer::RegisterId;
use crate::transfer::TransferDraft;
use crate::transfer::TransferType;
use crate::transfer::UserId;
use crate::transfer::Worker;
use crate::transfer::WorkerId;

pub const ADMIN_ID: UserId = UserId(1);
pub const MEMBER_ID: UserId = UserId(2);

/// Owned by [`ADMIN_ID`].
pub const MAIN: RegisterId = RegisterId(1);
/// Owned by [`MEMBER_ID`].
pub const SITE: RegisterId = RegisterId(2);
pub const UNKNOWN_REGISTER: RegisterId = RegisterId(99);

pub const HOUSE: InvestmentId = InvestmentId(1);
pub const BRIDGE: InvestmentId = InvestmentId(2);

pub const WORKER: WorkerId = WorkerId(1);
pub const OTHER_WORKER: WorkerId = WorkerId(2);

pub const TOOLS: OtherCategoryId = OtherCategoryId(1);
pub const FUEL: OtherCategoryId = OtherCategoryId(2);

pub fn admin() -> Caller {
    Caller::admin(ADMIN_ID)
}

pub fn member() -> Caller {
    Caller::member(MEMBER_ID)
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()
}

pub fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .transaction(|tx| {
            for (id, name, owner) in [(MAIN, "Main office", ADMIN_ID), (SITE, "Site cash", MEMBER_ID)] {
                tx.insert_cash_register(CashRegister {
                    id,
                    name: name.into(),
                    owner,
                    balance: Decimal::ZERO,
                })?;
            }
            for (id, name) in [(HOUSE, "Family house"), (BRIDGE, "Footbridge")] {
                tx.insert_investment(Investment {
                    id,
                    name: name.into(),
                    status: InvestmentStatus::Active,
                    total_costs: Decimal::ZERO,
                })?;
            }
            for (id, name) in [(WORKER, "Jan"), (OTHER_WORKER, "Ola")] {
                tx.insert_worker(Worker {
                    id,
                    name: name.into(),
                    role: "foreman".into(),
                })?;
            }
            for (id, name) in [(TOOLS, "Tools"), (FUEL, "Fuel")] {
                tx.insert_other_category(OtherCategory { id, name: name.into() })?;
            }
            Ok::<_, StoreError>(())
        })
        .unwrap();
    store
}

pub fn seeded_ledger() -> Ledger<InMemoryStore> {
    Ledger::new(seeded_store())
}

pub fn register_balance<S: LedgerStore>(ledger: &Ledger<S>, id: RegisterId) -> Decimal {
    ledger
        .store()
        .transaction(|tx| tx.cash_register(id))
        .unwrap()
        .unwrap()
        .balance
}

pub fn investment_costs<S: LedgerStore>(ledger: &Ledger<S>, id: InvestmentId) -> Decimal {
    ledger
        .store()
        .transaction(|tx| tx.investment(id))
        .unwrap()
        .unwrap()
        .total_costs
}

pub fn draft(transfer_type: TransferType, amount: &str) -> TransferDraft {
    TransferDraft::new(
        transfer_type,
        format!("{transfer_type} test"),
        dec(amount),
        date(),
        PaymentMethod::Cash,
    )
}

pub fn company_funding(register: RegisterId, amount: &str) -> TransferDraft {
    TransferDraft {
        source_register: Some(register),
        ..draft(TransferType::CompanyFunding, amount)
    }
}

pub fn investment_expense(register: RegisterId, investment: InvestmentId, amount: &str) -> TransferDraft {
    TransferDraft {
        source_register: Some(register),
        investment: Some(investment),
        ..draft(TransferType::InvestmentExpense, amount)
    }
}

pub fn register_transfer(from: RegisterId, to: RegisterId, amount: &str) -> TransferDraft {
    TransferDraft {
        source_register: Some(from),
        target_register: Some(to),
        ..draft(TransferType::RegisterTransfer, amount)
    }
}

pub fn account_funding(worker: WorkerId, register: RegisterId, amount: &str) -> TransferDraft {
    TransferDraft {
        source_register: Some(register),
        worker: Some(worker),
        ..draft(TransferType::AccountFunding, amount)
    }
}

pub fn employee_expense(
    worker: WorkerId,
    investment: Option<InvestmentId>,
    category: Option<OtherCategoryId>,
    amount: &str,
) -> TransferDraft {
    TransferDraft {
        worker: Some(worker),
        investment,
        other_category: category,
        ..draft(TransferType::EmployeeExpense, amount)
    }
}

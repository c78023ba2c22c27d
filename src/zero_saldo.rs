//! Zero-Saldo Workflow: books the single employee expense that brings a worker's saldo to zero.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::engine::Caller;
use crate::engine::Ledger;
use crate::engine::LedgerError;
use crate::store::LedgerStore;
use crate::transfer::InvestmentId;
use crate::transfer::PaymentMethod;
use crate::transfer::RegisterId;
use crate::transfer::Transfer;
use crate::transfer::TransferDraft;
use crate::transfer::TransferType;
use crate::transfer::WorkerId;

pub const ZERO_SALDO_DESCRIPTION: &str = "Worker saldo settlement";
pub const ZERO_SALDO_NOTE: &str = "Automatic zero-saldo settlement";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroSaldoRequest {
    pub worker: WorkerId,
    pub investment: InvestmentId,
    /// Register paying the saldo out, debited like any other outflow.
    pub register: Option<RegisterId>,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
}

/// Books the worker's current positive saldo as an employee expense against the chosen investment
/// and, when given, register.
///
/// Returns `Ok(None)` without writing anything when the saldo is zero or negative.
///
/// # Errors
///
/// Returns the [`LedgerError`] of the saldo query or of the write.
pub fn zero_worker_saldo<S: LedgerStore>(
    ledger: &Ledger<S>,
    caller: &Caller,
    request: &ZeroSaldoRequest,
) -> Result<Option<Transfer>, LedgerError> {
    let saldo = ledger.worker_saldo(request.worker, None)?;
    if saldo <= Decimal::ZERO {
        debug!(worker = %request.worker, %saldo, "nothing to zero");
        return Ok(None);
    }

    let mut draft = TransferDraft::new(
        TransferType::EmployeeExpense,
        ZERO_SALDO_DESCRIPTION,
        saldo,
        request.date,
        request.payment_method,
    );
    draft.worker = Some(request.worker);
    draft.investment = Some(request.investment);
    draft.source_register = request.register;
    draft.invoice_note = Some(ZERO_SALDO_NOTE.to_string());

    ledger.create_transfer(caller, &draft).map(Some)
}

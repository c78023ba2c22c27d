//! Settlement Batch Workflow.
//!
//! A settlement itemizes one invoice into several [`TransferType::EmployeeExpense`] transfers for a
//! single worker, either all attributed to one investment or each to its own category.
//!
//! Lines are written one after the other through [`Ledger::create_transfer`], each in its own
//! transaction. The first failing line stops the batch and the outcome reports how many transfers
//! were created before it; already created lines are kept. The evidence uploaded for the failing
//! line is discarded.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use tracing::warn;

use crate::engine::Caller;
use crate::engine::Ledger;
use crate::engine::LedgerError;
use crate::evidence::EvidenceError;
use crate::evidence::EvidenceFile;
use crate::evidence::EvidenceStore;
use crate::store::LedgerStore;
use crate::transfer::InvestmentId;
use crate::transfer::OtherCategoryId;
use crate::transfer::PaymentMethod;
use crate::transfer::Transfer;
use crate::transfer::TransferDraft;
use crate::transfer::TransferId;
use crate::transfer::TransferType;
use crate::transfer::WorkerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    pub worker: WorkerId,
    pub mode: SettlementMode,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    /// Shared by every line, and the fallback evidence for lines without a file.
    pub invoice_note: Option<String>,
    pub lines: Vec<SettlementLine>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SettlementMode {
    Investment(InvestmentId),
    Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementLine {
    pub description: String,
    pub amount: Decimal,
    /// Required in [`SettlementMode::Category`], ignored otherwise.
    pub category: Option<LineCategory>,
    pub evidence: Option<EvidenceFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCategory {
    pub category: OtherCategoryId,
    pub note: Option<String>,
}

/// Rejections detected before anything is uploaded or written.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SettlementError {
    #[error("settlement has no lines")]
    NoLines,
    #[error("line {line} has neither an evidence file nor a shared invoice note")]
    MissingEvidence { line: usize },
    #[error("line {line} has no category")]
    MissingCategory { line: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum LineError {
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The first line that failed, numbered from 1.
#[derive(Debug)]
pub struct LineFailure {
    pub line: usize,
    pub error: LineError,
}

#[derive(Debug)]
pub struct SettlementOutcome {
    pub created: Vec<Transfer>,
    pub total_lines: usize,
    pub failure: Option<LineFailure>,
}

impl SettlementOutcome {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn created_ids(&self) -> Vec<TransferId> {
        self.created.iter().map(|transfer| transfer.id).collect()
    }

    pub const fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Some lines were created and a later one failed.
    pub fn is_partial(&self) -> bool {
        self.failure.is_some() && !self.created.is_empty()
    }
}

impl fmt::Display for SettlementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            None => write!(f, "created {} transfers", self.created_count()),
            Some(LineFailure { line, error }) if self.created.is_empty() => {
                write!(f, "no transfers created, line {line} failed: {error}")
            }
            Some(LineFailure { line, error }) => write!(
                f,
                "created {} of {} transfers before line {line} failed: {error}",
                self.created_count(),
                self.total_lines,
            ),
        }
    }
}

/// Splits `request` into one employee expense per line.
///
/// # Errors
///
/// Returns a [`SettlementError`] if the request is rejected before any line is processed. Failures
/// of individual lines are reported in [`SettlementOutcome::failure`] instead.
pub fn submit_settlement<S, E>(
    ledger: &Ledger<S>,
    evidence_store: &E,
    caller: &Caller,
    request: &SettlementRequest,
) -> Result<SettlementOutcome, SettlementError>
where
    S: LedgerStore,
    E: EvidenceStore + ?Sized,
{
    check_request(request)?;

    let mut outcome = SettlementOutcome {
        created: Vec::with_capacity(request.lines.len()),
        total_lines: request.lines.len(),
        failure: None,
    };

    for (idx, line) in request.lines.iter().enumerate() {
        match submit_line(ledger, evidence_store, caller, request, line) {
            Ok(transfer) => outcome.created.push(transfer),
            Err(error) => {
                let line = idx + 1;
                warn!(%caller, worker = %request.worker, line, %error, "settlement line failed");
                outcome.failure = Some(LineFailure { line, error });
                break;
            }
        }
    }

    info!(%caller, worker = %request.worker, created = outcome.created_count(), total = outcome.total_lines, "settlement processed");
    Ok(outcome)
}

fn check_request(request: &SettlementRequest) -> Result<(), SettlementError> {
    if request.lines.is_empty() {
        return Err(SettlementError::NoLines);
    }
    let has_shared_note = request
        .invoice_note
        .as_deref()
        .is_some_and(|note| !note.trim().is_empty());

    for (idx, line) in request.lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.evidence.is_none() && !has_shared_note {
            return Err(SettlementError::MissingEvidence { line: line_no });
        }
        if request.mode == SettlementMode::Category && line.category.is_none() {
            return Err(SettlementError::MissingCategory { line: line_no });
        }
    }
    Ok(())
}

fn submit_line<S, E>(
    ledger: &Ledger<S>,
    evidence_store: &E,
    caller: &Caller,
    request: &SettlementRequest,
    line: &SettlementLine,
) -> Result<Transfer, LineError>
where
    S: LedgerStore,
    E: EvidenceStore + ?Sized,
{
    let evidence = line
        .evidence
        .as_ref()
        .map(|file| evidence_store.upload(file))
        .transpose()?;

    let mut draft = TransferDraft::new(
        TransferType::EmployeeExpense,
        line.description.clone(),
        line.amount,
        request.date,
        request.payment_method,
    );
    draft.worker = Some(request.worker);
    draft.evidence = evidence.clone();
    draft.invoice_note = request.invoice_note.clone();
    match (request.mode, &line.category) {
        (SettlementMode::Investment(investment), _) => draft.investment = Some(investment),
        (SettlementMode::Category, Some(category)) => {
            draft.other_category = Some(category.category);
            draft.category_description = category.note.clone();
        }
        (SettlementMode::Category, None) => {}
    }

    ledger.create_transfer(caller, &draft).map_err(|error| {
        if let Some(evidence) = &evidence
            && let Err(discard_error) = evidence_store.discard(evidence)
        {
            warn!(%evidence, error = %discard_error, "orphaned evidence");
        }
        LineError::from(error)
    })
}

#[cfg(test)]
#[path = "settlement/tests/settlement_tests.rs"]
mod settlement_tests;

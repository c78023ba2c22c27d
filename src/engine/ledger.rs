use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use tracing::warn;

use crate::engine::Caller;
use crate::recalc;
use crate::recalc::Drift;
use crate::recalc::RecalcError;
use crate::rules::TransferField;
use crate::saldo;
use crate::store::DateRange;
use crate::store::LedgerStore;
use crate::store::LedgerTx;
use crate::store::StoreError;
use crate::transfer::EntityRef;
use crate::transfer::EvidenceRef;
use crate::transfer::InvestmentId;
use crate::transfer::NormalizedTransfer;
use crate::transfer::OtherCategoryId;
use crate::transfer::RegisterId;
use crate::transfer::Transfer;
use crate::transfer::TransferDraft;
use crate::transfer::TransferId;
use crate::transfer::UserId;
use crate::transfer::WorkerId;
use crate::validation::ValidationContext;
use crate::validation::Violation;
use crate::validation::ViolationKind;
use crate::validation::Violations;
use crate::validation::validate_and_normalize;

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod ledger_tests;

/// Entry point for every write against the ledger.
///
/// Each operation runs in a single [`LedgerStore::transaction`]: an authorization, validation,
/// persistence or recalculation failure leaves neither the row nor any aggregate changed.
#[derive(Debug)]
pub struct Ledger<S> {
    store: S,
}

impl<S: LedgerStore> Ledger<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn transfer(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        self.store
            .transaction(|tx| tx.transfer(id)?.ok_or(LedgerError::TransferNotFound { id }))
    }

    /// Validates `draft`, persists it with the caller as creator and recomputes the aggregates it
    /// references.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The caller may not write against the draft's source register ([`LedgerError::Unauthorized`]).
    /// - The draft breaks the rule table or references unknown records ([`LedgerError::Validation`]).
    /// - The store or the recalculation fails ([`LedgerError::Store`], [`LedgerError::Recalc`]).
    pub fn create_transfer(&self, caller: &Caller, draft: &TransferDraft) -> Result<Transfer, LedgerError> {
        self.store
            .transaction(|tx| -> Result<Transfer, LedgerError> {
                authorize(tx, caller, draft_source_register(draft))?;
                let normalized = validate(tx, draft, &ValidationContext::create(caller))?;

                let transfer = tx.insert_transfer(normalized, Utc::now())?;
                recalc::recompute_touched(tx, None, Some(&transfer))?;
                Ok(transfer)
            })
            .inspect(|transfer| {
                info!(%caller, id = %transfer.id, transfer_type = %transfer.transfer_type, amount = %transfer.amount, "transfer created");
            })
            .inspect_err(|error| warn!(%caller, transfer_type = %draft.transfer_type, %error, "transfer rejected"))
    }

    /// Replaces the fields of transfer `id` with the normalized `draft`, keeping its creator.
    ///
    /// References the new type does not allow are dropped, and both the previous and the new
    /// owners of the row are recomputed.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::create_transfer`], plus [`LedgerError::TransferNotFound`]. The caller
    /// must be allowed to write against both the current and the new source register.
    pub fn update_transfer(
        &self,
        caller: &Caller,
        id: TransferId,
        draft: &TransferDraft,
    ) -> Result<Transfer, LedgerError> {
        self.store
            .transaction(|tx| -> Result<Transfer, LedgerError> {
                let previous = tx.transfer(id)?.ok_or(LedgerError::TransferNotFound { id })?;
                authorize(tx, caller, previous.source_register)?;
                authorize(tx, caller, draft_source_register(draft))?;
                let normalized = validate(tx, draft, &ValidationContext::update(previous.creator))?;

                let mut current = previous.clone();
                current.apply(normalized, Utc::now());
                tx.update_transfer(&current)?;
                recalc::recompute_touched(tx, Some(&previous), Some(&current))?;
                Ok(current)
            })
            .inspect(|transfer| info!(%caller, id = %transfer.id, transfer_type = %transfer.transfer_type, "transfer updated"))
            .inspect_err(|error| warn!(%caller, %id, %error, "transfer update rejected"))
    }

    /// Updates the only fields that do not affect any aggregate: the evidence reference and the
    /// invoice note.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransferNotFound`], [`LedgerError::Unauthorized`] or
    /// [`LedgerError::Store`].
    pub fn amend_evidence(
        &self,
        caller: &Caller,
        id: TransferId,
        evidence: Option<EvidenceRef>,
        invoice_note: Option<String>,
    ) -> Result<Transfer, LedgerError> {
        self.store.transaction(|tx| -> Result<Transfer, LedgerError> {
            let mut transfer = tx.transfer(id)?.ok_or(LedgerError::TransferNotFound { id })?;
            authorize(tx, caller, transfer.source_register)?;
            transfer.evidence = evidence;
            transfer.invoice_note = invoice_note.filter(|note| !note.trim().is_empty());
            transfer.updated_at = Utc::now();
            tx.update_transfer(&transfer)?;
            Ok(transfer)
        })
    }

    /// Deletes transfer `id` and recomputes everything it referenced.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransferNotFound`], [`LedgerError::Unauthorized`],
    /// [`LedgerError::Store`] or [`LedgerError::Recalc`].
    pub fn delete_transfer(&self, caller: &Caller, id: TransferId) -> Result<(), LedgerError> {
        self.store
            .transaction(|tx| -> Result<(), LedgerError> {
                let existing = tx.transfer(id)?.ok_or(LedgerError::TransferNotFound { id })?;
                authorize(tx, caller, existing.source_register)?;
                let deleted = tx.delete_transfer(id)?.ok_or(LedgerError::TransferNotFound { id })?;
                recalc::recompute_touched(tx, Some(&deleted), None)?;
                Ok(())
            })
            .inspect(|_| info!(%caller, %id, "transfer deleted"))
            .inspect_err(|error| warn!(%caller, %id, %error, "transfer delete rejected"))
    }

    /// Recomputes and persists the aggregate owned by `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Recalc`] if the aggregate cannot be computed or persisted.
    pub fn recompute_entity(&self, entity: EntityRef) -> Result<Decimal, LedgerError> {
        Ok(self.store.transaction(|tx| recalc::recompute_entity(tx, entity))?)
    }

    /// Recomputes every aggregate, returning the entities that were out of sync.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Recalc`]; no aggregate is changed in that case.
    pub fn repair_all(&self) -> Result<Vec<Drift>, LedgerError> {
        let drifts = self.store.transaction(|tx| recalc::repair_all(tx))?;
        info!(drifted = drifts.len(), "aggregates repaired");
        Ok(drifts)
    }

    pub fn worker_saldo(&self, worker: WorkerId, range: Option<DateRange>) -> Result<Decimal, LedgerError> {
        Ok(self.store.transaction(|tx| saldo::worker_saldo(tx, worker, range))?)
    }

    pub fn worker_saldos(&self, range: Option<DateRange>) -> Result<BTreeMap<WorkerId, Decimal>, LedgerError> {
        Ok(self.store.transaction(|tx| saldo::worker_saldos(tx, range))?)
    }
}

/// The source register that will be persisted for `draft`, if its type carries one.
fn draft_source_register(draft: &TransferDraft) -> Option<RegisterId> {
    References::of_draft(draft).source_register
}

fn authorize(tx: &dyn LedgerTx, caller: &Caller, register: Option<RegisterId>) -> Result<(), LedgerError> {
    let Some(register) = register else {
        return Ok(());
    };
    // Unknown registers are reported by `validate` with the other violations.
    match tx.cash_register(register)? {
        Some(found) if !caller.may_write_against(&found) => Err(LedgerError::Unauthorized {
            caller: caller.id,
            register,
        }),
        _ => Ok(()),
    }
}

/// Runs the rule table and the reference lookups, reporting the violations of both together.
fn validate(
    tx: &dyn LedgerTx,
    draft: &TransferDraft,
    context: &ValidationContext,
) -> Result<NormalizedTransfer, LedgerError> {
    match validate_and_normalize(draft, context) {
        Ok(normalized) => {
            Violations::check(References::of_normalized(&normalized).unknown(tx)?)?;
            Ok(normalized)
        }
        Err(mut violations) => {
            violations.extend(References::of_draft(draft).unknown(tx)?);
            Err(violations.into())
        }
    }
}

/// The references a transfer would persist.
struct References {
    source_register: Option<RegisterId>,
    target_register: Option<RegisterId>,
    investment: Option<InvestmentId>,
    worker: Option<WorkerId>,
    other_category: Option<OtherCategoryId>,
}

impl References {
    /// References of a draft that failed normalization, minus those its type clears.
    fn of_draft(draft: &TransferDraft) -> Self {
        let rules = draft.transfer_type.rules();
        let shown = |field| rules.shows(field);
        Self {
            source_register: draft.source_register.filter(|_| shown(TransferField::SourceRegister)),
            target_register: draft.target_register.filter(|_| shown(TransferField::TargetRegister)),
            investment: draft.investment.filter(|_| shown(TransferField::Investment)),
            worker: draft.worker.filter(|_| shown(TransferField::Worker)),
            other_category: draft.other_category.filter(|_| shown(TransferField::OtherCategory)),
        }
    }

    const fn of_normalized(normalized: &NormalizedTransfer) -> Self {
        Self {
            source_register: normalized.source_register,
            target_register: normalized.target_register,
            investment: normalized.investment,
            worker: normalized.worker,
            other_category: normalized.other_category,
        }
    }

    fn unknown(&self, tx: &dyn LedgerTx) -> Result<Vec<Violation>, StoreError> {
        let mut violations = Vec::new();
        let mut unknown = |field: TransferField, id: u32| {
            violations.push(Violation::new(field, ViolationKind::UnknownReference(id)));
        };

        for (field, register) in [
            (TransferField::SourceRegister, self.source_register),
            (TransferField::TargetRegister, self.target_register),
        ] {
            if let Some(id) = register
                && tx.cash_register(id)?.is_none()
            {
                unknown(field, id.0);
            }
        }
        if let Some(id) = self.investment
            && tx.investment(id)?.is_none()
        {
            unknown(TransferField::Investment, id.0);
        }
        if let Some(id) = self.worker
            && tx.worker(id)?.is_none()
        {
            unknown(TransferField::Worker, id.0);
        }
        if let Some(id) = self.other_category
            && tx.other_category(id)?.is_none()
        {
            unknown(TransferField::OtherCategory, id.0);
        }

        Ok(violations)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("caller id={caller} may not write against register={register}")]
    Unauthorized { caller: UserId, register: RegisterId },
    #[error("invalid transfer: {0}")]
    Validation(#[from] Violations),
    #[error("transfer not found id={id}")]
    TransferNotFound { id: TransferId },
    #[error(transparent)]
    Recalc(#[from] RecalcError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Field violations, when this error carries any.
    pub const fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Validation(violations) => Some(violations),
            _ => None,
        }
    }
}

//! Validation Engine: turns a [`TransferDraft`] into a [`NormalizedTransfer`] or the full list of
//! [`Violation`]s.
//!
//! Every field is checked against [`TransferType::rules`]; violations are collected rather than
//! returned on the first failure so that a form can highlight every offending input at once.
//! References the rule table does not ask for are cleared, which also drops stale references when
//! an update changes the type of a row.

use std::fmt;

use rust_decimal::Decimal;

use crate::engine::Caller;
use crate::rules::Requirement;
use crate::rules::TransferField;
use crate::rules::TypeRules;
use crate::transfer::NormalizedTransfer;
use crate::transfer::PositiveAmount;
use crate::transfer::TransferDraft;
use crate::transfer::TransferType;
use crate::transfer::UserId;

/// Where the draft comes from, which decides how the creator is stamped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValidationContext {
    Create { caller: UserId },
    Update { existing_creator: UserId },
}

impl ValidationContext {
    pub const fn create(caller: &Caller) -> Self {
        Self::Create { caller: caller.id }
    }

    pub const fn update(existing_creator: UserId) -> Self {
        Self::Update { existing_creator }
    }

    const fn creator(self) -> UserId {
        match self {
            Self::Create { caller } => caller,
            Self::Update { existing_creator } => existing_creator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, parse_display::Display)]
#[display("{path}: {kind}")]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(path: impl ToString, kind: ViolationKind) -> Self {
        Self {
            path: path.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, parse_display::Display)]
pub enum ViolationKind {
    #[display("required for {0}")]
    Missing(TransferType),
    #[display("either {first} or {second} is required")]
    EitherOrMissing { first: TransferField, second: TransferField },
    #[display("must differ from the source register")]
    SameRegister,
    #[display("must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),
    #[display("must not be blank")]
    EmptyDescription,
    #[display("references an unknown record id={0}")]
    UnknownReference(u32),
}

/// Non empty list of violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn single(violation: Violation) -> Self {
        Self(vec![violation])
    }

    /// `Ok(())` when `violations` is empty.
    pub fn check(violations: Vec<Violation>) -> Result<(), Self> {
        if violations.is_empty() {
            return Ok(());
        }
        Err(Self(violations))
    }

    pub fn as_slice(&self) -> &[Violation] {
        &self.0
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|violation| violation.path.as_str())
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.paths().any(|p| p == path)
    }
}

impl Extend<Violation> for Violations {
    fn extend<I: IntoIterator<Item = Violation>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, violation) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Violations {}

/// Validates `draft` against the rule table of its type and returns the normalized transfer.
///
/// For the either/or pair of [`crate::transfer::TransferType::EmployeeExpense`] the investment wins
/// when both sides are supplied; the category and its free-text description are then cleared.
///
/// # Errors
///
/// Returns every [`Violation`] found. Nothing is normalized partially: any violation rejects the
/// whole draft.
pub fn validate_and_normalize(
    draft: &TransferDraft,
    context: &ValidationContext,
) -> Result<NormalizedTransfer, Violations> {
    let rules = draft.transfer_type.rules();
    let mut violations = Vec::new();

    if draft.description.trim().is_empty() {
        violations.push(Violation::new("description", ViolationKind::EmptyDescription));
    }

    let amount = PositiveAmount::try_from(draft.amount)
        .inspect_err(|_| violations.push(Violation::new("amount", ViolationKind::NonPositiveAmount(draft.amount))))
        .ok();

    let source_register = keep_field(&rules, TransferField::SourceRegister, draft.source_register, draft, &mut violations);
    let target_register = keep_field(&rules, TransferField::TargetRegister, draft.target_register, draft, &mut violations);
    let investment = keep_field(&rules, TransferField::Investment, draft.investment, draft, &mut violations);
    let worker = keep_field(&rules, TransferField::Worker, draft.worker, draft, &mut violations);
    let mut other_category = keep_field(&rules, TransferField::OtherCategory, draft.other_category, draft, &mut violations);

    let mut either_or = rules.either_or_fields();
    if let (Some(first), Some(second)) = (either_or.next(), either_or.next()) {
        match (investment, other_category) {
            (None, None) => {
                let kind = ViolationKind::EitherOrMissing { first, second };
                violations.push(Violation::new(first, kind.clone()));
                violations.push(Violation::new(second, kind));
            }
            (Some(_), Some(_)) => other_category = None,
            _ => {}
        }
    }

    if let (Some(source), Some(target)) = (source_register, target_register)
        && source == target
    {
        violations.push(Violation::new(TransferField::TargetRegister, ViolationKind::SameRegister));
    }

    Violations::check(violations)?;
    let Some(amount) = amount else {
        return Err(Violations::single(Violation::new(
            "amount",
            ViolationKind::NonPositiveAmount(draft.amount),
        )));
    };

    Ok(NormalizedTransfer {
        description: draft.description.trim().to_string(),
        amount,
        date: draft.date,
        transfer_type: draft.transfer_type,
        payment_method: draft.payment_method,
        source_register,
        target_register,
        investment,
        worker,
        other_category,
        category_description: other_category.and(draft.category_description.clone()),
        evidence: draft.evidence.clone(),
        invoice_note: draft.invoice_note.clone().filter(|note| !note.trim().is_empty()),
        creator: context.creator(),
    })
}

/// Applies a single field requirement, returning the value to persist.
fn keep_field<T>(
    rules: &TypeRules,
    field: TransferField,
    value: Option<T>,
    draft: &TransferDraft,
    violations: &mut Vec<Violation>,
) -> Option<T> {
    match rules.requirement(field) {
        Requirement::Required => {
            if value.is_none() {
                violations.push(Violation::new(field, ViolationKind::Missing(draft.transfer_type)));
            }
            value
        }
        Requirement::Forbidden => None,
        Requirement::Optional | Requirement::EitherOr => value,
    }
}

#[cfg(test)]
#[path = "validation/tests/validation_tests.rs"]
mod validation_tests;

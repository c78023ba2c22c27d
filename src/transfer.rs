use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub struct TransferId(pub u32);

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub struct RegisterId(pub u32);

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub struct InvestmentId(pub u32);

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub struct WorkerId(pub u32);

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub struct OtherCategoryId(pub u32);

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub struct UserId(pub u32);

/// Opaque handle returned by an [`crate::evidence::EvidenceStore`] upload.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, PartialEq, Eq, parse_display::Display)]
pub struct EvidenceRef(pub String);

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[display(style = "SNAKE_CASE")]
pub enum TransferType {
    InvestorDeposit,
    StageSettlement,
    CompanyFunding,
    OtherDeposit,
    InvestmentExpense,
    AccountFunding,
    EmployeeExpense,
    RegisterTransfer,
    Other,
}

impl TransferType {
    pub const ALL: [Self; 9] = [
        Self::InvestorDeposit,
        Self::StageSettlement,
        Self::CompanyFunding,
        Self::OtherDeposit,
        Self::InvestmentExpense,
        Self::AccountFunding,
        Self::EmployeeExpense,
        Self::RegisterTransfer,
        Self::Other,
    ];
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, PartialEq, Eq, parse_display::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[display(style = "SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
}

/// A transfer as submitted by a caller, before validation.
///
/// The amount is a raw [`Decimal`] on purpose: rejecting non positive amounts is the validation
/// engine's job so that the violation can be reported against the `amount` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDraft {
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub transfer_type: TransferType,
    pub payment_method: PaymentMethod,
    pub source_register: Option<RegisterId>,
    pub target_register: Option<RegisterId>,
    pub investment: Option<InvestmentId>,
    pub worker: Option<WorkerId>,
    pub other_category: Option<OtherCategoryId>,
    pub category_description: Option<String>,
    pub evidence: Option<EvidenceRef>,
    pub invoice_note: Option<String>,
}

impl TransferDraft {
    /// A draft with every optional reference unset.
    pub fn new(
        transfer_type: TransferType,
        description: impl Into<String>,
        amount: Decimal,
        date: NaiveDate,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            description: description.into(),
            amount,
            date,
            transfer_type,
            payment_method,
            source_register: None,
            target_register: None,
            investment: None,
            worker: None,
            other_category: None,
            category_description: None,
            evidence: None,
            invoice_note: None,
        }
    }
}

/// Output of [`crate::validation::validate_and_normalize`]: every reference matches the rule table
/// of its type and the creator is stamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTransfer {
    pub description: String,
    pub amount: PositiveAmount,
    pub date: NaiveDate,
    pub transfer_type: TransferType,
    pub payment_method: PaymentMethod,
    pub source_register: Option<RegisterId>,
    pub target_register: Option<RegisterId>,
    pub investment: Option<InvestmentId>,
    pub worker: Option<WorkerId>,
    pub other_category: Option<OtherCategoryId>,
    pub category_description: Option<String>,
    pub evidence: Option<EvidenceRef>,
    pub invoice_note: Option<String>,
    pub creator: UserId,
}

/// The persisted ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub id: TransferId,
    pub description: String,
    pub amount: PositiveAmount,
    pub date: NaiveDate,
    pub transfer_type: TransferType,
    pub payment_method: PaymentMethod,
    pub source_register: Option<RegisterId>,
    pub target_register: Option<RegisterId>,
    pub investment: Option<InvestmentId>,
    pub worker: Option<WorkerId>,
    pub other_category: Option<OtherCategoryId>,
    pub category_description: Option<String>,
    pub evidence: Option<EvidenceRef>,
    pub invoice_note: Option<String>,
    pub creator: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    pub fn from_normalized(id: TransferId, normalized: NormalizedTransfer, now: DateTime<Utc>) -> Self {
        Self {
            id,
            description: normalized.description,
            amount: normalized.amount,
            date: normalized.date,
            transfer_type: normalized.transfer_type,
            payment_method: normalized.payment_method,
            source_register: normalized.source_register,
            target_register: normalized.target_register,
            investment: normalized.investment,
            worker: normalized.worker,
            other_category: normalized.other_category,
            category_description: normalized.category_description,
            evidence: normalized.evidence,
            invoice_note: normalized.invoice_note,
            creator: normalized.creator,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces every user supplied field, keeping identity and creation time.
    pub fn apply(&mut self, normalized: NormalizedTransfer, now: DateTime<Utc>) {
        let id = self.id;
        let created_at = self.created_at;
        *self = Self::from_normalized(id, normalized, now);
        self.created_at = created_at;
    }

    /// Materialized aggregates this row contributes to.
    pub fn references(&self) -> BTreeSet<EntityRef> {
        self.source_register
            .into_iter()
            .chain(self.target_register)
            .map(EntityRef::Register)
            .chain(self.investment.map(EntityRef::Investment))
            .collect()
    }
}

/// An entity owning a materialized aggregate.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub enum EntityRef {
    #[display("register={0}")]
    Register(RegisterId),
    #[display("investment={0}")]
    Investment(InvestmentId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashRegister {
    pub id: RegisterId,
    pub name: String,
    pub owner: UserId,
    pub balance: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    #[default]
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Investment {
    pub id: InvestmentId,
    pub name: String,
    pub status: InvestmentStatus,
    pub total_costs: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherCategory {
    pub id: OtherCategoryId,
    pub name: String,
}

/// This permits to avoid checks on non positive amounts once a transfer is validated.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, parse_display::Display)]
pub struct PositiveAmount(Decimal);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("amount must be greater than zero value={0}")]
pub struct NonPositiveAmount(pub Decimal);

impl TryFrom<Decimal> for PositiveAmount {
    type Error = NonPositiveAmount;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value <= Decimal::ZERO {
            return Err(NonPositiveAmount(value));
        }
        Ok(Self(value))
    }
}

impl PositiveAmount {
    pub const fn as_inner(&self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for PositiveAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let decimal = <Decimal as serde::Deserialize>::deserialize(deserializer)?;
        Self::try_from(decimal).map_err(|error| serde::de::Error::custom(error.to_string()))
    }
}

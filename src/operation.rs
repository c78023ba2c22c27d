//! Operations read from the `cashbook` input CSV.
//!
//! Columns: `op,id,type,description,amount,date,payment_method,source_register,target_register,
//! investment,worker,other_category,category_description,invoice_note`. Only `op` is always
//! required; `create` and `update` need the transfer columns, `update` and `delete` the `id`.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Deserializer;
use tracing::info;

use crate::engine::Caller;
use crate::engine::Ledger;
use crate::engine::LedgerError;
use crate::store::LedgerStore;
use crate::transfer::InvestmentId;
use crate::transfer::OtherCategoryId;
use crate::transfer::PaymentMethod;
use crate::transfer::RegisterId;
use crate::transfer::TransferDraft;
use crate::transfer::TransferId;
use crate::transfer::TransferType;
use crate::transfer::WorkerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create(TransferDraft),
    Update { id: TransferId, draft: TransferDraft },
    Delete { id: TransferId },
    Repair,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(draft) => write!(f, "op=(create type={} amount={})", draft.transfer_type, draft.amount),
            Self::Update { id, draft } => write!(
                f,
                "op=(update id={id} type={} amount={})",
                draft.transfer_type, draft.amount
            ),
            Self::Delete { id } => write!(f, "op=(delete id={id})"),
            Self::Repair => write!(f, "op=(repair)"),
        }
    }
}

impl Operation {
    /// Runs the operation through the write path as `caller`.
    ///
    /// # Errors
    ///
    /// Returns the [`LedgerError`] of the underlying ledger operation.
    pub fn apply<S: LedgerStore>(&self, ledger: &Ledger<S>, caller: &Caller) -> Result<(), LedgerError> {
        match self {
            Self::Create(draft) => ledger.create_transfer(caller, draft).map(|_| ()),
            Self::Update { id, draft } => ledger.update_transfer(caller, *id, draft).map(|_| ()),
            Self::Delete { id } => ledger.delete_transfer(caller, *id),
            Self::Repair => {
                for drift in ledger.repair_all()? {
                    info!(%drift, "aggregate repaired");
                }
                Ok(())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct CsvRow {
            op: String,
            id: Option<TransferId>,
            r#type: Option<TransferType>,
            description: Option<String>,
            amount: Option<String>,
            date: Option<NaiveDate>,
            payment_method: Option<PaymentMethod>,
            source_register: Option<RegisterId>,
            target_register: Option<RegisterId>,
            investment: Option<InvestmentId>,
            worker: Option<WorkerId>,
            other_category: Option<OtherCategoryId>,
            category_description: Option<String>,
            invoice_note: Option<String>,
        }

        impl CsvRow {
            fn id<E: serde::de::Error>(&self) -> Result<TransferId, E> {
                self.id.ok_or_else(|| E::missing_field("id"))
            }

            fn into_draft<E: serde::de::Error>(self) -> Result<TransferDraft, E> {
                let amount = self.amount.ok_or_else(|| E::missing_field("amount"))?;
                let amount = Decimal::from_str(&amount).map_err(|error| E::custom(format!("invalid amount: {error}")))?;
                let mut draft = TransferDraft::new(
                    self.r#type.ok_or_else(|| E::missing_field("type"))?,
                    self.description.unwrap_or_default(),
                    amount,
                    self.date.ok_or_else(|| E::missing_field("date"))?,
                    self.payment_method.ok_or_else(|| E::missing_field("payment_method"))?,
                );
                draft.source_register = self.source_register;
                draft.target_register = self.target_register;
                draft.investment = self.investment;
                draft.worker = self.worker;
                draft.other_category = self.other_category;
                draft.category_description = self.category_description;
                draft.invoice_note = self.invoice_note;
                Ok(draft)
            }
        }

        let row = CsvRow::deserialize(deserializer)?;

        match row.op.as_str() {
            "create" => Ok(Self::Create(row.into_draft::<D::Error>()?)),
            "update" => {
                let id = row.id::<D::Error>()?;
                Ok(Self::Update {
                    id,
                    draft: row.into_draft::<D::Error>()?,
                })
            }
            "delete" => Ok(Self::Delete {
                id: row.id::<D::Error>()?,
            }),
            "repair" => Ok(Self::Repair),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["create", "update", "delete", "repair"],
            )),
        }
    }
}

//! Declarative per-type field contract.
//!
//! [`TransferType::rules`] is the only place describing which relationships a transfer of a given
//! type must carry. Validation ([`crate::validation`]) and any presentation layer read the same
//! table, so "what a form shows" and "what the ledger accepts" cannot drift apart.

use crate::transfer::TransferType;

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, parse_display::Display)]
pub enum TransferField {
    #[display("source_register")]
    SourceRegister,
    #[display("target_register")]
    TargetRegister,
    #[display("investment")]
    Investment,
    #[display("worker")]
    Worker,
    #[display("other_category")]
    OtherCategory,
}

impl TransferField {
    pub const ALL: [Self; 5] = [
        Self::SourceRegister,
        Self::TargetRegister,
        Self::Investment,
        Self::Worker,
        Self::OtherCategory,
    ];
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Requirement {
    Required,
    /// Kept when set, never reported when missing.
    Optional,
    /// Cleared during normalization.
    Forbidden,
    /// Exactly one of the fields marked `EitherOr` in the same [`TypeRules`] must be set.
    EitherOr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypeRules {
    pub source_register: Requirement,
    pub target_register: Requirement,
    pub investment: Requirement,
    pub worker: Requirement,
    pub other_category: Requirement,
}

impl TypeRules {
    pub const fn requirement(&self, field: TransferField) -> Requirement {
        match field {
            TransferField::SourceRegister => self.source_register,
            TransferField::TargetRegister => self.target_register,
            TransferField::Investment => self.investment,
            TransferField::Worker => self.worker,
            TransferField::OtherCategory => self.other_category,
        }
    }

    /// Whether an input for `field` is offered at all for this type.
    pub const fn shows(&self, field: TransferField) -> bool {
        !matches!(self.requirement(field), Requirement::Forbidden)
    }

    pub fn either_or_fields(&self) -> impl Iterator<Item = TransferField> + '_ {
        TransferField::ALL
            .into_iter()
            .filter(|field| self.requirement(*field) == Requirement::EitherOr)
    }
}

const fn only_source() -> TypeRules {
    TypeRules {
        source_register: Requirement::Required,
        target_register: Requirement::Forbidden,
        investment: Requirement::Forbidden,
        worker: Requirement::Forbidden,
        other_category: Requirement::Forbidden,
    }
}

impl TransferType {
    pub const fn rules(self) -> TypeRules {
        use Requirement::EitherOr;
        use Requirement::Forbidden;
        use Requirement::Optional;
        use Requirement::Required;

        match self {
            Self::InvestorDeposit | Self::StageSettlement | Self::InvestmentExpense => TypeRules {
                investment: Required,
                ..only_source()
            },
            Self::CompanyFunding | Self::OtherDeposit => only_source(),
            Self::AccountFunding => TypeRules {
                worker: Required,
                ..only_source()
            },
            Self::EmployeeExpense => TypeRules {
                source_register: Optional,
                target_register: Forbidden,
                investment: EitherOr,
                worker: Required,
                other_category: EitherOr,
            },
            Self::RegisterTransfer => TypeRules {
                target_register: Required,
                ..only_source()
            },
            Self::Other => TypeRules {
                other_category: Required,
                ..only_source()
            },
        }
    }

    /// Adds to the source register instead of subtracting from it.
    pub const fn is_deposit(self) -> bool {
        matches!(
            self,
            Self::InvestorDeposit | Self::StageSettlement | Self::CompanyFunding | Self::OtherDeposit
        )
    }

    /// Counted into the referenced investment's total costs.
    pub const fn is_cost(self) -> bool {
        matches!(self, Self::InvestmentExpense | Self::EmployeeExpense)
    }

    /// Sign of this type in a worker's saldo, `0` when it does not contribute.
    pub const fn worker_saldo_sign(self) -> i8 {
        match self {
            Self::AccountFunding => 1,
            Self::EmployeeExpense => -1,
            _ => 0,
        }
    }

    pub fn deposit_types() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|t| t.is_deposit())
    }

    /// Types that subtract from their source register when they carry one, including
    /// [`TransferType::RegisterTransfer`].
    pub fn outflow_types() -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(|t| !t.is_deposit() && t.rules().shows(TransferField::SourceRegister))
    }

    pub fn cost_types() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|t| t.is_cost())
    }
}

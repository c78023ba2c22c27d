//! Single-transfer write path.
//!
//! Provides [`Ledger`] which authorizes the caller, validates and normalizes the draft
//! ([`crate::validation`]), writes the row and recomputes every touched aggregate
//! ([`crate::recalc`]) inside one store transaction.
//! [`caller`] module provides the identity the write path is executed on behalf of.

pub mod caller;
pub mod ledger;

pub use caller::Caller;
pub use caller::Role;
pub use ledger::Ledger;
pub use ledger::LedgerError;

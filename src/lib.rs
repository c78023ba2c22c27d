//! Ledger consistency core for a construction company's bookkeeping.
//!
//! Transfers are typed money movements validated against a declarative per-type rule table
//! ([`rules`], [`validation`]). Cash register balances and investment total costs are derived
//! state, recomputed by full aggregation after every write ([`recalc`]) inside the same store
//! transaction as the write itself ([`engine`]). Worker saldo is never stored and is computed on
//! demand ([`saldo`]). [`settlement`] and [`zero_saldo`] are workflows built on the single-transfer
//! write path.

pub mod config;
pub mod engine;
pub mod evidence;
pub mod logging;
pub mod operation;
pub mod recalc;
pub mod report;
pub mod rules;
pub mod saldo;
pub mod settlement;
pub mod store;
pub mod transfer;
pub mod validation;
pub mod zero_saldo;

#[cfg(test)]
mod test_fixtures;

pub use engine::Caller;
pub use engine::Ledger;
pub use engine::LedgerError;
pub use engine::Role;

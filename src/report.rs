//! CSV report of the derived state: register balances, investment total costs and worker saldos.

use std::io;

use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::engine::Ledger;
use crate::engine::LedgerError;
use crate::store::LedgerStore;
use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("csv serialization error row={row}, source_error={source}")]
    Csv {
        row: String,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, parse_display::Display)]
#[serde(rename_all = "snake_case")]
#[display(style = "snake_case")]
enum RowKind {
    Register,
    Investment,
    WorkerSaldo,
}

#[derive(Debug, Serialize)]
struct ReportRow {
    kind: RowKind,
    id: u32,
    name: String,
    /// Rendered from a normalized [`Decimal`] to keep the output exact and stable.
    amount: String,
}

impl ReportRow {
    fn new(kind: RowKind, id: u32, name: &str, amount: Decimal) -> Self {
        Self {
            kind,
            id,
            name: name.to_string(),
            amount: amount.normalize().to_string(),
        }
    }
}

/// Writes every register, then every investment, then every worker saldo, each group in
/// ascending id order.
///
/// # Errors
///
/// Returns an error if:
/// - The state cannot be read from the store.
/// - A row cannot be serialized or the writer fails.
pub fn write_report<S, W>(ledger: &Ledger<S>, out: W) -> Result<(), ReportError>
where
    S: LedgerStore,
    W: io::Write,
{
    let (registers, investments, workers) = ledger
        .store()
        .transaction(|tx| Ok::<_, StoreError>((tx.cash_registers()?, tx.investments()?, tx.workers()?)))?;
    let saldos = ledger.worker_saldos(None)?;

    let rows = registers
        .iter()
        .map(|register| ReportRow::new(RowKind::Register, register.id.0, &register.name, register.balance))
        .chain(investments.iter().map(|investment| {
            ReportRow::new(RowKind::Investment, investment.id.0, &investment.name, investment.total_costs)
        }))
        .chain(workers.iter().map(|worker| {
            let saldo = saldos.get(&worker.id).copied().unwrap_or_default();
            ReportRow::new(RowKind::WorkerSaldo, worker.id.0, &worker.name, saldo)
        }));

    let mut writer = Writer::from_writer(out);
    for row in rows {
        writer.serialize(&row).map_err(|source| ReportError::Csv {
            row: format!("{}:{}", row.kind, row.id),
            source,
        })?;
    }
    writer.flush()?;
    Ok(())
}

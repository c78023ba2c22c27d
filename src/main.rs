use cashbook::Ledger;
use cashbook::config::Config;
use cashbook::logging;
use cashbook::operation::Operation;
use cashbook::report;
use cashbook::store::InMemoryStore;
use color_eyre::eyre::OptionExt as _;
use csv::ReaderBuilder;
use csv::Trim;
use tracing::error;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let mut args = std::env::args().skip(1);
    let config_path = args.next().ok_or_eyre("no config TOML supplied")?;
    let ops_file_path = args.next().ok_or_eyre("no operations CSV supplied")?;

    let config = Config::load(&config_path)?;
    logging::init(&config.logging)?;

    let store = InMemoryStore::new();
    config.seed(&store)?;
    let ledger = Ledger::new(store);

    let mut ops_file_reader = ReaderBuilder::new().trim(Trim::All).from_path(ops_file_path)?;

    let mut failed_rows = 0_usize;
    for (idx, op_res) in ops_file_reader.deserialize::<Operation>().enumerate() {
        let row = idx + 1;
        let op = match op_res {
            Ok(op) => op,
            Err(error) => {
                error!(row, %error, "failed to deserialize operation");
                failed_rows += 1;
                continue;
            }
        };

        if let Err(error) = op.apply(&ledger, &config.caller) {
            error!(row, %op, %error, "operation failed");
            failed_rows += 1;
        }
    }

    report::write_report(&ledger, std::io::stdout().lock())?;

    if failed_rows > 0 {
        error!(failed_rows, "some operations failed");
        std::process::exit(1);
    }
    Ok(())
}

//! TOML configuration of the `cashbook` binary: the acting caller, logging options and the
//! reference records the ledger starts from.

use std::path::Path;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::engine::Caller;
use crate::store::LedgerStore;
use crate::store::StoreError;
use crate::transfer::CashRegister;
use crate::transfer::Investment;
use crate::transfer::InvestmentId;
use crate::transfer::InvestmentStatus;
use crate::transfer::OtherCategory;
use crate::transfer::OtherCategoryId;
use crate::transfer::RegisterId;
use crate::transfer::UserId;
use crate::transfer::Worker;
use crate::transfer::WorkerId;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config path={path}, source_error={source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Identity every operation of the run is performed as.
    pub caller: Caller,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cash_registers: Vec<RegisterSeed>,
    #[serde(default)]
    pub investments: Vec<InvestmentSeed>,
    #[serde(default)]
    pub workers: Vec<WorkerSeed>,
    #[serde(default)]
    pub other_categories: Vec<CategorySeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterSeed {
    pub id: RegisterId,
    pub name: String,
    pub owner: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvestmentSeed {
    pub id: InvestmentId,
    pub name: String,
    #[serde(default)]
    pub status: InvestmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerSeed {
    pub id: WorkerId,
    pub name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategorySeed {
    pub id: OtherCategoryId,
    pub name: String,
}

impl Config {
    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read.
    /// - The content is not a valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Inserts every configured record into `store` in one transaction, with zeroed aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if an id is configured twice or already stored.
    pub fn seed(&self, store: &impl LedgerStore) -> Result<(), StoreError> {
        store.transaction(|tx| {
            for seed in &self.cash_registers {
                tx.insert_cash_register(CashRegister {
                    id: seed.id,
                    name: seed.name.clone(),
                    owner: seed.owner,
                    balance: Decimal::ZERO,
                })?;
            }
            for seed in &self.investments {
                tx.insert_investment(Investment {
                    id: seed.id,
                    name: seed.name.clone(),
                    status: seed.status,
                    total_costs: Decimal::ZERO,
                })?;
            }
            for seed in &self.workers {
                tx.insert_worker(Worker {
                    id: seed.id,
                    name: seed.name.clone(),
                    role: seed.role.clone(),
                })?;
            }
            for seed in &self.other_categories {
                tx.insert_other_category(OtherCategory {
                    id: seed.id,
                    name: seed.name.clone(),
                })?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use assert2::let_assert;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::engine::Role;
    use crate::store::InMemoryStore;

    const FULL: &str = r#"
        caller = { id = 1, role = "admin" }

        [logging]
        level = "cashbook=debug"
        json = true

        [[cash_registers]]
        id = 1
        name = "Main office"
        owner = 1

        [[investments]]
        id = 10
        name = "Family house"
        status = "completed"

        [[workers]]
        id = 3
        name = "Jan"
        role = "foreman"

        [[other_categories]]
        id = 4
        name = "Tools"
    "#;

    #[test]
    fn from_toml_str_reads_every_section() {
        let config = Config::from_toml_str(FULL).unwrap();

        assert_eq!(config.caller.role, Role::Admin);
        assert_eq!(
            config.logging,
            LoggingConfig {
                level: "cashbook=debug".into(),
                json: true,
            }
        );
        assert_eq!(config.cash_registers[0].owner, UserId(1));
        assert_eq!(config.investments[0].status, InvestmentStatus::Completed);
        assert_eq!(config.workers[0].role, "foreman");
        assert_eq!(config.other_categories[0].id, OtherCategoryId(4));
    }

    #[test]
    fn sections_other_than_the_caller_are_optional() {
        let config = Config::from_toml_str(r#"caller = { id = 2, role = "member" }"#).unwrap();

        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.cash_registers.is_empty());
        assert!(config.workers.is_empty());
    }

    #[test]
    fn unknown_keys_and_missing_caller_are_rejected() {
        let_assert!(Err(ConfigError::Parse(_)) = Config::from_toml_str("[logging]\nlevel = \"info\""));
        let_assert!(
            Err(ConfigError::Parse(_)) = Config::from_toml_str("caller = { id = 1, role = \"admin\" }\nfoo = 1")
        );
    }

    #[test]
    fn load_reports_the_missing_path() {
        let_assert!(Err(ConfigError::Io { path, .. }) = Config::load("does/not/exist.toml"));
        assert_eq!(path, PathBuf::from("does/not/exist.toml"));
    }

    #[test]
    fn seed_inserts_records_and_rejects_duplicates() {
        let config = Config::from_toml_str(FULL).unwrap();
        let store = InMemoryStore::new();

        config.seed(&store).unwrap();

        let register = store.transaction(|tx| tx.cash_register(RegisterId(1))).unwrap().unwrap();
        assert_eq!(register.balance, Decimal::ZERO);
        let investment = store.transaction(|tx| tx.investment(InvestmentId(10))).unwrap().unwrap();
        assert_eq!(investment.status, InvestmentStatus::Completed);

        let_assert!(Err(StoreError::Duplicate { .. }) = config.seed(&store));
    }
}

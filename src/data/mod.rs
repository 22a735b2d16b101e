// ABOUTME: Persisted per-deployment data: environment variables and deployment history.
// ABOUTME: Backed by a single redb file; sealed values use the daemon's NaCl key.

mod sealing;

pub use sealing::{SealError, SealingKeys};

use chrono::{DateTime, SecondsFormat, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_VARIABLES: TableDefinition<&str, &[u8]> = TableDefinition::new("envVariables");
const DEPLOYED_PROJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployedProjects");

const ENCRYPTED_PLACEHOLDER: &str = "[ENCRYPTED]";

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("failed to open data store: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("data store transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("data store table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("data store storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("data store commit failed: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("malformed record: {0}")]
    Record(#[from] serde_json::Error),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error("data store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct EnvVariable {
    value: Vec<u8>,
    encrypted: bool,
}

/// One successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub commit_hash: String,
    pub build_type: String,
    pub containers: Vec<String>,
    pub deployed_at: DateTime<Utc>,
}

pub struct DeploymentDataManager {
    db: Database,
    keys: SealingKeys,
}

impl DeploymentDataManager {
    /// Open (or create) the store at `db_path`, sealing with the key at `key_path`.
    pub fn open(db_path: &Path, key_path: &Path) -> Result<Self, DataError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(db_path)?;
        let keys = SealingKeys::load_or_generate(key_path)?;
        tracing::debug!(path = %db_path.display(), "data store opened");
        Ok(Self { db, keys })
    }

    /// Store `name=value`, sealing the value first when `encrypt` is set.
    pub fn add_env_variable(&self, name: &str, value: &str, encrypt: bool) -> Result<(), DataError> {
        if name.is_empty() {
            return Err(DataError::EmptyField("environment variable name"));
        }
        if value.is_empty() {
            return Err(DataError::EmptyField("environment variable value"));
        }

        let record = EnvVariable {
            value: if encrypt {
                self.keys.seal(value.as_bytes())?
            } else {
                value.as_bytes().to_vec()
            },
            encrypted: encrypt,
        };
        let bytes = serde_json::to_vec(&record)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENV_VARIABLES)?;
            table.insert(name, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn remove_env_variable(&self, name: &str) -> Result<(), DataError> {
        self.remove_env_variables(&[name])
    }

    /// Remove every named variable in one transaction. Unknown names are ignored.
    pub fn remove_env_variables(&self, names: &[&str]) -> Result<(), DataError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENV_VARIABLES)?;
            for name in names {
                table.remove(*name)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// All variables as `NAME=VALUE`, ordered by name.
    ///
    /// Sealed values show as `NAME=[ENCRYPTED]` unless `decrypt` is set. A sealed
    /// value that no longer opens (the key was rotated) is deleted and yields `NAME=`.
    pub fn get_env_variables(&self, decrypt: bool) -> Result<Vec<String>, DataError> {
        let mut variables = Vec::new();
        let mut unreadable = Vec::new();

        for (name, record) in self.env_records()? {
            let value = match (record.encrypted, decrypt) {
                (false, _) => String::from_utf8_lossy(&record.value).into_owned(),
                (true, false) => ENCRYPTED_PLACEHOLDER.to_string(),
                (true, true) => match self.keys.open(&record.value) {
                    Ok(plain) => String::from_utf8_lossy(&plain).into_owned(),
                    Err(e) => {
                        tracing::warn!(variable = %name, "removing unreadable sealed variable: {e}");
                        unreadable.push(name.clone());
                        String::new()
                    }
                },
            };
            variables.push(format!("{name}={value}"));
        }

        if !unreadable.is_empty() {
            let names: Vec<&str> = unreadable.iter().map(String::as_str).collect();
            self.remove_env_variables(&names)?;
        }
        Ok(variables)
    }

    fn env_records(&self) -> Result<Vec<(String, EnvVariable)>, DataError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(ENV_VARIABLES) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (name, value) = entry?;
            records.push((
                name.value().to_string(),
                serde_json::from_slice(value.value())?,
            ));
        }
        Ok(records)
    }

    /// Append a history entry for `project`.
    pub fn add_build_record(&self, project: &str, record: &DeploymentRecord) -> Result<(), DataError> {
        let key = format!(
            "{project}/{}",
            record.deployed_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );
        let bytes = serde_json::to_vec(record)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DEPLOYED_PROJECTS)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// History entries for `project`, oldest first.
    pub fn build_history(&self, project: &str) -> Result<Vec<DeploymentRecord>, DataError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(DEPLOYED_PROJECTS) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        // '0' sorts directly after '/'.
        let start = format!("{project}/");
        let end = format!("{project}0");
        let mut records = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Drop every table. The store stays usable and starts empty.
    pub fn destroy(&self) -> Result<(), DataError> {
        let txn = self.db.begin_write()?;
        txn.delete_table(ENV_VARIABLES)?;
        txn.delete_table(DEPLOYED_PROJECTS)?;
        txn.commit()?;
        tracing::info!("data store cleared");
        Ok(())
    }
}

impl std::fmt::Debug for DeploymentDataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentDataManager").finish_non_exhaustive()
    }
}

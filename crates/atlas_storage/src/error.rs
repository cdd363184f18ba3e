#![forbid(unsafe_code)]

use std::path::PathBuf;

use atlas_kernel_contracts::{ContractViolation, LatticeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config {field}: {reason}")]
    Config {
        field: &'static str,
        reason: String,
    },
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("{table} is append-only")]
    AppendOnlyViolation { table: &'static str },
    #[error("ledger record {field}: {reason}")]
    LedgerValidation {
        field: &'static str,
        reason: &'static str,
    },
    #[error("ledger t={got} precedes last appended t={last}")]
    OutOfOrder { last: u64, got: u64 },
    #[error("certificate checksum mismatch: recorded {recorded}, computed {computed}")]
    ChecksumMismatch { recorded: String, computed: String },
    #[error(transparent)]
    Lattice(#[from] LatticeError),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::Lattice(LatticeError::Contract(v))
    }
}

pub(crate) fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.into();
    move |source| StorageError::Io { path, source }
}

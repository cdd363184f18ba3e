#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use atlas_kernel_contracts::lattice::GuardedContext;
use atlas_kernel_contracts::ledger::LedgerRecord;
use atlas_kernel_contracts::Validate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{io_error, StorageError};

const LEDGER_TABLE: &str = "ledger_entries";

/// Accepted top-level shapes: a bare array, or an object with an `entries` array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LedgerFile {
    List(Vec<LedgerRecord>),
    Wrapped { entries: Vec<LedgerRecord> },
}

#[derive(Debug, Serialize)]
struct LedgerFileOut<'a> {
    entries: &'a [LedgerRecord],
}

pub fn parse_ledger(contents: &str) -> Result<Vec<LedgerRecord>, StorageError> {
    let file: LedgerFile = serde_json::from_str(contents)?;
    Ok(match file {
        LedgerFile::List(entries) | LedgerFile::Wrapped { entries } => entries,
    })
}

pub fn load_ledger(path: impl AsRef<Path>) -> Result<Vec<LedgerRecord>, StorageError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(io_error(path))?;
    let entries = parse_ledger(&contents)?;
    debug!(path = %path.display(), entries = entries.len(), "ledger loaded");
    Ok(entries)
}

pub fn write_ledger(path: impl AsRef<Path>, entries: &[LedgerRecord]) -> Result<(), StorageError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(&LedgerFileOut { entries })?;
    fs::write(path, json).map_err(io_error(path))
}

/// Append-only in-memory ledger. Records are validated on the way in, `t` never goes
/// backwards, and `entry_id`s are unique. There is no update or delete path.
#[derive(Debug, Default)]
pub struct LedgerStore {
    entries: Vec<LedgerRecord>,
    last_t: Option<u64>,
    entry_ids: BTreeSet<String>,
}

impl LedgerStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    /// Rebuilds a store from loaded records, re-checking every append rule.
    pub fn from_records(records: Vec<LedgerRecord>) -> Result<Self, StorageError> {
        let mut store = Self::new_in_memory();
        for rec in records {
            store.append(rec)?;
        }
        Ok(store)
    }

    pub fn append(&mut self, rec: LedgerRecord) -> Result<usize, StorageError> {
        rec.validate()?;
        if let (Some(last), Some(t)) = (self.last_t, rec.t) {
            if t < last {
                return Err(StorageError::OutOfOrder { last, got: t });
            }
        }
        if let Some(id) = &rec.entry_id {
            if self.entry_ids.contains(id) {
                return Err(StorageError::DuplicateKey {
                    table: LEDGER_TABLE,
                    key: id.clone(),
                });
            }
            self.entry_ids.insert(id.clone());
        }
        if rec.t.is_some() {
            self.last_t = rec.t;
        }
        self.entries.push(rec);
        Ok(self.entries.len() - 1)
    }

    /// Logs a committed step. The guarded context must carry its step index.
    pub fn append_step(
        &mut self,
        ctx: &GuardedContext,
        entry_id: Option<String>,
    ) -> Result<usize, StorageError> {
        let t = ctx.t.ok_or(StorageError::LedgerValidation {
            field: "guarded_context.t",
            reason: "committed steps must carry t",
        })?;
        self.append(LedgerRecord::committed_step(entry_id, t, ctx)?)
    }

    pub fn append_closing(
        &mut self,
        kind: &str,
        t: u64,
        ace_entry_id: Option<String>,
    ) -> Result<usize, StorageError> {
        self.append(LedgerRecord::closing(kind, t, ace_entry_id)?)
    }

    pub fn append_checkpoint(&mut self, t: u64) -> Result<usize, StorageError> {
        self.append(LedgerRecord::checkpoint(t))
    }

    pub fn entries(&self) -> &[LedgerRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn attempt_overwrite(
        &mut self,
        _index: usize,
        _rec: LedgerRecord,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: LEDGER_TABLE,
        })
    }
}

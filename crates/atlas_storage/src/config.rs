#![forbid(unsafe_code)]

//! TOML loading for the schedule and the audit bundle.
//!
//! Schedule file:
//!
//! ```toml
//! [schedule]
//! window_size = 768
//! window_count = 16
//! audit_interval = 768
//! ```
//!
//! Audit bundle:
//!
//! ```toml
//! [policy]
//! class_skew_tolerance = 1
//! anchor_skew_tolerance = 1
//! per_step_kinds = ["petc"]
//!
//! [intervals]
//! audit_every = 768
//!
//! [indexing]
//! classes = 96
//! anchors = 6
//! ```
//!
//! Missing tables and keys take their defaults. `[indexing]` is optional and, when present,
//! must match the lattice constants.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use atlas_kernel_contracts::audit::{AuditPolicy, ScheduleConfig};
use atlas_kernel_contracts::lattice::{ANCHORS, CLASSES};
use atlas_kernel_contracts::Validate;
use serde::Deserialize;
use tracing::debug;

use crate::error::{io_error, StorageError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScheduleFile {
    schedule: ScheduleConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BundleFile {
    policy: PolicySection,
    intervals: IntervalSection,
    indexing: Option<IndexingSection>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PolicySection {
    class_skew_tolerance: u64,
    anchor_skew_tolerance: u64,
    per_step_kinds: BTreeSet<String>,
}

impl Default for PolicySection {
    fn default() -> Self {
        let policy = AuditPolicy::default();
        Self {
            class_skew_tolerance: policy.class_skew_tolerance,
            anchor_skew_tolerance: policy.anchor_skew_tolerance,
            per_step_kinds: policy.per_step_kinds,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct IntervalSection {
    audit_every: u64,
}

impl Default for IntervalSection {
    fn default() -> Self {
        Self {
            audit_every: AuditPolicy::default().audit_every,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexingSection {
    classes: Option<u32>,
    anchors: Option<u32>,
}

pub fn parse_schedule(contents: &str) -> Result<ScheduleConfig, StorageError> {
    let file: ScheduleFile = toml::from_str(contents)?;
    file.schedule.validate()?;
    Ok(file.schedule)
}

pub fn load_schedule(path: impl AsRef<Path>) -> Result<ScheduleConfig, StorageError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(io_error(path))?;
    let schedule = parse_schedule(&contents)?;
    debug!(path = %path.display(), ?schedule, "schedule loaded");
    Ok(schedule)
}

pub fn parse_audit_bundle(contents: &str) -> Result<AuditPolicy, StorageError> {
    let file: BundleFile = toml::from_str(contents)?;
    if let Some(indexing) = &file.indexing {
        check_constant("indexing.classes", indexing.classes, CLASSES)?;
        check_constant("indexing.anchors", indexing.anchors, ANCHORS)?;
    }
    let policy = AuditPolicy::v1(
        file.policy.class_skew_tolerance,
        file.policy.anchor_skew_tolerance,
        file.intervals.audit_every,
        file.policy.per_step_kinds,
    )?;
    Ok(policy)
}

pub fn load_audit_bundle(path: impl AsRef<Path>) -> Result<AuditPolicy, StorageError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(io_error(path))?;
    let policy = parse_audit_bundle(&contents)?;
    debug!(path = %path.display(), ?policy, "audit bundle loaded");
    Ok(policy)
}

fn check_constant(
    field: &'static str,
    declared: Option<u32>,
    expected: u32,
) -> Result<(), StorageError> {
    match declared {
        Some(v) if v != expected => Err(StorageError::Config {
            field,
            reason: format!("declares {v}, lattice has {expected}"),
        }),
        _ => Ok(()),
    }
}

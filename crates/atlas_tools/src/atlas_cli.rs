#![forbid(unsafe_code)]

use std::path::Path;

use atlas_engines::{audit, build_certificate, guard_context};
use atlas_kernel_contracts::audit::{AuditPolicy, ScheduleConfig};
use atlas_kernel_contracts::lattice::{StepContext, StepCoordinates};
use atlas_storage::{load_audit_bundle, load_ledger, load_schedule, write_certificate};
use serde::Serialize;
use tracing::info;

/// What a subcommand prints, and whether its verdict held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub passed: bool,
}

impl CommandOutput {
    fn pass(stdout: String) -> Self {
        Self {
            stdout,
            passed: true,
        }
    }
}

fn to_json(value: &impl Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize output: {e}"))
}

/// Builds the certificate. With `out` it is written there and only the checksum is printed.
pub fn execute_certificate_command(out: Option<&Path>) -> Result<CommandOutput, String> {
    let cert = build_certificate().map_err(|e| format!("certificate generation failed: {e}"))?;
    match out {
        Some(path) => {
            write_certificate(path, &cert).map_err(|e| format!("failed to write certificate: {e}"))?;
            info!(path = %path.display(), "certificate written");
            Ok(CommandOutput::pass(cert.checksum))
        }
        None => Ok(CommandOutput::pass(to_json(&cert)?)),
    }
}

pub fn execute_guard_command(
    class_id: u32,
    coord: Option<u32>,
    anchor: Option<u32>,
    v_bits: Option<u32>,
) -> Result<CommandOutput, String> {
    let coordinates = StepCoordinates::from_parts(coord, anchor, v_bits)
        .map_err(|e| format!("guard rejected input: {e}"))?;
    let guarded = guard_context(&StepContext::new(class_id, coordinates))
        .map_err(|e| format!("guard rejected input: {e}"))?;
    Ok(CommandOutput::pass(to_json(&guarded)?))
}

pub fn execute_audit_command(
    ledger: &Path,
    schedule: Option<&Path>,
    bundle: Option<&Path>,
) -> Result<CommandOutput, String> {
    let records = load_ledger(ledger).map_err(|e| format!("failed to load ledger: {e}"))?;
    let schedule = match schedule {
        Some(path) => load_schedule(path).map_err(|e| format!("failed to load schedule: {e}"))?,
        None => ScheduleConfig::default(),
    };
    let policy = match bundle {
        Some(path) => {
            load_audit_bundle(path).map_err(|e| format!("failed to load audit bundle: {e}"))?
        }
        None => AuditPolicy::default(),
    };
    let report = audit(&records, &schedule, &policy).map_err(|e| format!("audit failed: {e}"))?;
    Ok(CommandOutput {
        stdout: to_json(&report)?,
        passed: report.all_ok(),
    })
}

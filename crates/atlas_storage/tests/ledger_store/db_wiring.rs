#![forbid(unsafe_code)]

use atlas_engines::{audit, guard_context};
use atlas_kernel_contracts::audit::{AuditPolicy, ScheduleConfig};
use atlas_kernel_contracts::lattice::{GuardedContext, StepContext, StepCoordinates};
use atlas_kernel_contracts::ledger::{LedgerRecord, KIND_PETC};
use atlas_storage::{load_ledger, write_ledger, LedgerStore, StorageError};

fn guarded(class_id: u32, coord_idx: u32, t: u64) -> GuardedContext {
    let ctx = StepContext::new(class_id, StepCoordinates::Linear { coord_idx })
        .with_step(t)
        .with_metadata("ace", format!("ace_{t}"));
    guard_context(&ctx).unwrap()
}

fn store_with_steps(n: u64) -> LedgerStore {
    let mut s = LedgerStore::new_in_memory();
    for t in 0..n {
        let ctx = guarded((t % 96) as u32, t as u32, t);
        s.append_step(&ctx, Some(format!("ace_{t}"))).unwrap();
        s.append_closing(KIND_PETC, t, Some(format!("ace_{t}")))
            .unwrap();
    }
    s
}

#[test]
fn at_ledger_db_01_guarded_steps_round_trip_through_audit() {
    let mut s = store_with_steps(96);
    s.append_checkpoint(96).unwrap();

    let schedule = ScheduleConfig::v1(96, 1, 96).unwrap();
    let report = audit(s.entries(), &schedule, &AuditPolicy::default()).unwrap();
    assert_eq!(report.total_steps, 96);
    assert_eq!(report.class_skew, 0);
    assert!(report.missing_petc.is_empty());
    assert!(report.audit_compliance_ok);
    assert_eq!(report.coords_visited, 96);
    assert!(report.coverage_complete);
}

#[test]
fn at_ledger_db_02_duplicate_entry_id_rejected() {
    let mut s = store_with_steps(2);
    let ctx = guarded(3, 3, 2);
    assert!(matches!(
        s.append_step(&ctx, Some("ace_1".to_string())),
        Err(StorageError::DuplicateKey { .. })
    ));
    assert_eq!(s.len(), 4);
}

#[test]
fn at_ledger_db_03_step_without_t_rejected() {
    let mut s = LedgerStore::new_in_memory();
    let ctx = guard_context(&StepContext::new(0, StepCoordinates::Linear { coord_idx: 0 })).unwrap();
    assert!(matches!(
        s.append_step(&ctx, None),
        Err(StorageError::LedgerValidation {
            field: "guarded_context.t",
            ..
        })
    ));
    assert!(s.is_empty());
}

#[test]
fn at_ledger_db_04_overwrite_is_never_allowed() {
    let mut s = store_with_steps(1);
    assert!(matches!(
        s.attempt_overwrite(0, LedgerRecord::checkpoint(0)),
        Err(StorageError::AppendOnlyViolation { table: "ledger_entries" })
    ));
    assert_eq!(s.entries()[0].entry_id.as_deref(), Some("ace_0"));
}

#[test]
fn at_ledger_db_05_file_round_trip_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let s = store_with_steps(4);
    write_ledger(&path, s.entries()).unwrap();

    let loaded = load_ledger(&path).unwrap();
    assert_eq!(loaded, s.entries());
    let rebuilt = LedgerStore::from_records(loaded).unwrap();
    assert_eq!(rebuilt.len(), 8);
}

#[test]
fn at_ledger_db_06_loaded_ledger_with_t_regression_rejected() {
    let records = vec![LedgerRecord::checkpoint(10), LedgerRecord::checkpoint(5)];
    assert!(matches!(
        LedgerStore::from_records(records),
        Err(StorageError::OutOfOrder { last: 10, got: 5 })
    ));
}

#[test]
fn at_ledger_db_07_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_ledger(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
    assert!(err.to_string().contains("absent.json"));
}

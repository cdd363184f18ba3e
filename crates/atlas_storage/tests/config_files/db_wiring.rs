#![forbid(unsafe_code)]

use std::fs;

use atlas_kernel_contracts::audit::ScheduleConfig;
use atlas_storage::{load_audit_bundle, load_schedule, StorageError};

#[test]
fn at_config_db_01_schedule_and_bundle_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let schedule_path = dir.path().join("schedule.toml");
    let bundle_path = dir.path().join("audit.toml");
    fs::write(
        &schedule_path,
        "[schedule]\nwindow_size = 512\nwindow_count = 24\naudit_interval = 512\n",
    )
    .unwrap();
    fs::write(
        &bundle_path,
        "[policy]\nclass_skew_tolerance = 2\nper_step_kinds = [\"petc\"]\n\n[intervals]\naudit_every = 512\n",
    )
    .unwrap();

    let schedule = load_schedule(&schedule_path).unwrap();
    assert_eq!(schedule, ScheduleConfig::v1(512, 24, 512).unwrap());
    assert_eq!(schedule.scheduled_coords(), 12_288);

    let policy = load_audit_bundle(&bundle_path).unwrap();
    assert_eq!(policy.class_skew_tolerance, 2);
    assert_eq!(policy.anchor_skew_tolerance, 1);
    assert_eq!(policy.effective_interval(&schedule), 512);
}

#[test]
fn at_config_db_02_malformed_toml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.toml");
    fs::write(&path, "[schedule\nwindow_size = ").unwrap();
    assert!(matches!(load_schedule(&path), Err(StorageError::Toml(_))));
}

#[test]
fn at_config_db_03_reserved_per_step_kind_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.toml");
    fs::write(&path, "[policy]\nper_step_kinds = [\"audit\"]\n").unwrap();
    assert!(matches!(
        load_audit_bundle(&path),
        Err(StorageError::Lattice(_))
    ));
}

#[test]
fn at_config_db_04_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_schedule(dir.path().join("nope.toml")),
        Err(StorageError::Io { .. })
    ));
}

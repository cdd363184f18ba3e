#![forbid(unsafe_code)]

use std::fs;

use atlas_engines::build_certificate;
use atlas_storage::{read_certificate, write_certificate, StorageError};

#[test]
fn at_cert_db_01_written_certificate_reads_back_verified() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cert.json");
    let cert = build_certificate().unwrap();
    write_certificate(&path, &cert).unwrap();

    let loaded = read_certificate(&path).unwrap();
    assert_eq!(loaded, cert);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["type"], "Z2_11_subgroup_certificate");
    assert_eq!(raw["order"], 2048);
}

#[test]
fn at_cert_db_02_edited_certificate_fails_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cert.json");
    let cert = build_certificate().unwrap();
    write_certificate(&path, &cert).unwrap();

    let mut raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    raw["classes"] = serde_json::json!(95);
    fs::write(&path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();

    match read_certificate(&path) {
        Err(StorageError::ChecksumMismatch { recorded, computed }) => {
            assert_eq!(recorded, cert.checksum);
            assert_ne!(computed, cert.checksum);
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[test]
fn at_cert_db_03_non_certificate_json_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cert.json");
    fs::write(&path, r#"{"type": "something_else"}"#).unwrap();
    assert!(matches!(read_certificate(&path), Err(StorageError::Json(_))));
}

#![forbid(unsafe_code)]

pub mod certificate;
pub mod config;
pub mod error;
pub mod ledger;

pub use certificate::{read_certificate, write_certificate};
pub use config::{load_audit_bundle, load_schedule, parse_audit_bundle, parse_schedule};
pub use error::StorageError;
pub use ledger::{load_ledger, parse_ledger, write_ledger, LedgerStore};

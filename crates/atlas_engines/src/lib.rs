#![forbid(unsafe_code)]

pub mod audit;
pub mod certificate;
pub mod guard;
pub mod lattice;
pub mod subgroup;

pub use audit::{audit, AuditRuntime};
pub use certificate::{build_certificate, verify_checksum, CertificateBuilder};
pub use guard::{guard_address, guard_context};
pub use lattice::{decode, encode, fold, unfold, verify_address};

#![forbid(unsafe_code)]

pub mod audit;
pub mod certificate;
pub mod common;
pub mod lattice;
pub mod ledger;

pub use common::{ContractViolation, SchemaVersion, Validate};
pub use lattice::LatticeError;

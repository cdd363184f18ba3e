#![forbid(unsafe_code)]

//! Record types of the (Z/2)^11 subgroup certificate.
//!
//! The certificate is a constructive consistency check of the lattice's coordinate structure.
//! Its checksum gives tamper-evidence only; it is not a cryptographic attestation.

use serde::{Deserialize, Serialize};

use crate::SchemaVersion;

pub const CERTIFICATE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);
pub const CERTIFICATE_TYPE: &str = "Z2_11_subgroup_certificate";

/// Which grid component a generator flips a bit of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorTarget {
    /// `col XOR (1 << bit)`.
    Column,
    /// Flips `bit` of `row mod 16`, leaving the `row div 16` component fixed.
    RowResidue16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorDescriptor {
    pub index: u8,
    pub target: GeneratorTarget,
    pub bit: u8,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPosition {
    pub anchor: u8,
    pub row: u8,
    pub col: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub row: u8,
    pub col: u8,
}

/// One orbit point reconstructed twice: by walking generators and by `fold(encode(..))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitSample {
    pub anchor: u8,
    pub gray_index: u16,
    pub gray_code: u16,
    pub walked: GridPoint,
    pub folded: GridPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgroupCertificate {
    #[serde(rename = "type")]
    pub certificate_type: String,
    pub schema_version: SchemaVersion,
    pub description: String,
    pub classes: u32,
    pub anchors: u32,
    pub orbit_size: u32,
    pub coords_per_class: u32,
    pub fold_rows: u32,
    pub fold_cols: u32,
    pub order: u32,
    pub rank: u32,
    pub generators: Vec<GeneratorDescriptor>,
    pub anchor_positions: Vec<AnchorPosition>,
    pub orbit_samples: Vec<OrbitSample>,
    /// Lowercase hex SHA-256 of the body (every field above, in order).
    pub checksum: String,
}

/// Borrowed view of everything the checksum covers.
#[derive(Debug, Serialize)]
pub struct CertificateBody<'a> {
    #[serde(rename = "type")]
    pub certificate_type: &'a str,
    pub schema_version: SchemaVersion,
    pub description: &'a str,
    pub classes: u32,
    pub anchors: u32,
    pub orbit_size: u32,
    pub coords_per_class: u32,
    pub fold_rows: u32,
    pub fold_cols: u32,
    pub order: u32,
    pub rank: u32,
    pub generators: &'a [GeneratorDescriptor],
    pub anchor_positions: &'a [AnchorPosition],
    pub orbit_samples: &'a [OrbitSample],
}

impl SubgroupCertificate {
    pub fn body(&self) -> CertificateBody<'_> {
        CertificateBody {
            certificate_type: &self.certificate_type,
            schema_version: self.schema_version,
            description: &self.description,
            classes: self.classes,
            anchors: self.anchors,
            orbit_size: self.orbit_size,
            coords_per_class: self.coords_per_class,
            fold_rows: self.fold_rows,
            fold_cols: self.fold_cols,
            order: self.order,
            rank: self.rank,
            generators: &self.generators,
            anchor_positions: &self.anchor_positions,
            orbit_samples: &self.orbit_samples,
        }
    }
}

#![forbid(unsafe_code)]

//! Subgroup certificate generator.
//!
//! Builds a self-describing record of the (Z/2)^11 structure and cross-checks sampled orbit
//! points, reached by walking generators, against `fold(encode(..))`. The SHA-256 checksum
//! over the canonical body makes accidental edits detectable. It is a constructive
//! consistency check, not a cryptographic attestation: anyone can regenerate it.

use std::collections::BTreeSet;

use atlas_kernel_contracts::certificate::{
    AnchorPosition, CertificateBody, GridPoint, OrbitSample, SubgroupCertificate,
    CERTIFICATE_CONTRACT_VERSION, CERTIFICATE_TYPE,
};
use atlas_kernel_contracts::lattice::{
    GridPos, LatticeError, LatticeField, ANCHORS, CLASSES, COORDS_PER_CLASS, FOLD_COLS,
    FOLD_ROWS, ORBIT, ORBIT_RANK,
};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::lattice::{encode, fold};
use crate::subgroup::{act, anchor_base, gray11_inverse, group_order, Generator, GrayWalk};

pub const DEFAULT_SAMPLE_GRAY_INDICES: [u16; 6] = [0, 1, 2, 3, 1024, 2047];

const DESCRIPTION: &str =
    "(Z/2)^11 acting on (row, col) by bit flips: 8 on col, 3 on the low bits of row mod 16";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBuilder {
    anchors: Vec<u8>,
    sample_gray_indices: Vec<u16>,
}

impl Default for CertificateBuilder {
    fn default() -> Self {
        Self {
            anchors: (0..ANCHORS as u8).collect(),
            sample_gray_indices: DEFAULT_SAMPLE_GRAY_INDICES.to_vec(),
        }
    }
}

impl CertificateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the certified anchor set. Anchors are deduplicated and kept in order.
    pub fn with_anchors(
        mut self,
        anchors: impl IntoIterator<Item = u32>,
    ) -> Result<Self, LatticeError> {
        let mut set = BTreeSet::new();
        for anchor in anchors {
            if anchor >= ANCHORS {
                return Err(LatticeError::Range {
                    field: LatticeField::Anchor,
                    got: anchor,
                    bound: ANCHORS,
                });
            }
            set.insert(anchor as u8);
        }
        if set.is_empty() {
            return Err(LatticeError::Certificate(
                "anchor set must not be empty".to_string(),
            ));
        }
        self.anchors = set.into_iter().collect();
        Ok(self)
    }

    pub fn with_sample_gray_indices(
        mut self,
        indices: impl IntoIterator<Item = u16>,
    ) -> Result<Self, LatticeError> {
        let indices: Vec<u16> = indices.into_iter().collect();
        if let Some(bad) = indices.iter().find(|&&g| u32::from(g) >= ORBIT) {
            return Err(LatticeError::Range {
                field: LatticeField::VBits,
                got: u32::from(*bad),
                bound: ORBIT,
            });
        }
        self.sample_gray_indices = indices;
        Ok(self)
    }

    pub fn build(&self) -> Result<SubgroupCertificate, LatticeError> {
        verify_group_laws(&self.anchors)?;

        let mut anchor_positions = Vec::with_capacity(self.anchors.len());
        let mut orbit_samples = Vec::new();
        for &anchor in &self.anchors {
            let base = anchor_base(u32::from(anchor))?;
            anchor_positions.push(AnchorPosition {
                anchor,
                row: base.row,
                col: base.col,
            });
            orbit_samples.extend(sample_anchor(anchor, &self.sample_gray_indices)?);
        }

        let mut cert = SubgroupCertificate {
            certificate_type: CERTIFICATE_TYPE.to_string(),
            schema_version: CERTIFICATE_CONTRACT_VERSION,
            description: DESCRIPTION.to_string(),
            classes: CLASSES,
            anchors: anchor_positions.len() as u32,
            orbit_size: ORBIT,
            coords_per_class: COORDS_PER_CLASS,
            fold_rows: FOLD_ROWS,
            fold_cols: FOLD_COLS,
            order: group_order(),
            rank: ORBIT_RANK,
            generators: Generator::all().map(Generator::descriptor).collect(),
            anchor_positions,
            orbit_samples,
            checksum: String::new(),
        };
        cert.checksum = compute_checksum(&cert.body())?;
        debug!(
            samples = cert.orbit_samples.len(),
            checksum = %cert.checksum,
            "subgroup certificate built"
        );
        Ok(cert)
    }
}

/// Builds the certificate for the fixed lattice constants and all six anchors.
pub fn build_certificate() -> Result<SubgroupCertificate, LatticeError> {
    CertificateBuilder::default().build()
}

pub fn compute_checksum(body: &CertificateBody<'_>) -> Result<String, LatticeError> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| LatticeError::Certificate(format!("canonical serialization failed: {e}")))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Recomputes the checksum of a (possibly reloaded) certificate.
pub fn verify_checksum(cert: &SubgroupCertificate) -> Result<bool, LatticeError> {
    Ok(compute_checksum(&cert.body())? == cert.checksum)
}

fn grid_point(pos: GridPos) -> GridPoint {
    GridPoint {
        row: pos.row,
        col: pos.col,
    }
}

fn sample_anchor(anchor: u8, gray_indices: &[u16]) -> Result<Vec<OrbitSample>, LatticeError> {
    let wanted: BTreeSet<u16> = gray_indices.iter().copied().collect();
    let base = anchor_base(u32::from(anchor))?;
    let mut out = Vec::with_capacity(wanted.len());
    for step in GrayWalk::from_anchor(u32::from(anchor))? {
        if !wanted.contains(&step.gray_index) {
            continue;
        }
        if gray11_inverse(step.gray_code) != step.gray_index {
            return Err(LatticeError::Certificate(format!(
                "gray code {} does not invert to index {}",
                step.gray_code, step.gray_index
            )));
        }
        if act(base, step.gray_code) != step.pos {
            return Err(LatticeError::Certificate(format!(
                "anchor {anchor} gray index {}: walk and direct action disagree",
                step.gray_index
            )));
        }
        let coord = encode(u32::from(anchor), u32::from(step.gray_code))?;
        let folded = fold(u32::from(coord))?;
        if folded != step.pos {
            return Err(LatticeError::Certificate(format!(
                "anchor {anchor} gray index {}: walked ({}, {}) but fold gives ({}, {})",
                step.gray_index, step.pos.row, step.pos.col, folded.row, folded.col
            )));
        }
        out.push(OrbitSample {
            anchor,
            gray_index: step.gray_index,
            gray_code: step.gray_code,
            walked: grid_point(step.pos),
            folded: grid_point(folded),
        });
    }
    Ok(out)
}

/// Involutions, pairwise commutation at every anchor base, and a free transitive walk
/// over the first certified anchor's orbit.
fn verify_group_laws(anchors: &[u8]) -> Result<(), LatticeError> {
    for &anchor in anchors {
        let base = anchor_base(u32::from(anchor))?;
        for a in Generator::all() {
            if a.apply(a.apply(base)) != base {
                return Err(LatticeError::Certificate(format!(
                    "generator {} is not an involution at anchor {anchor}",
                    a.index()
                )));
            }
            for b in Generator::all().filter(|b| b.index() > a.index()) {
                if a.apply(b.apply(base)) != b.apply(a.apply(base)) {
                    return Err(LatticeError::Certificate(format!(
                        "generators {} and {} do not commute at anchor {anchor}",
                        a.index(),
                        b.index()
                    )));
                }
            }
        }
    }

    let Some(&first) = anchors.first() else {
        return Err(LatticeError::Certificate(
            "anchor set must not be empty".to_string(),
        ));
    };
    let visited: BTreeSet<GridPos> = GrayWalk::from_anchor(u32::from(first))?
        .map(|step| step.pos)
        .collect();
    if visited.len() as u32 != group_order() {
        return Err(LatticeError::Certificate(format!(
            "orbit of anchor {first} has {} points, expected {}",
            visited.len(),
            group_order()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_cert_01_default_certificate_describes_the_lattice() {
        let cert = build_certificate().unwrap();
        assert_eq!(cert.classes, 96);
        assert_eq!(cert.anchors, 6);
        assert_eq!(cert.orbit_size, 2048);
        assert_eq!(cert.order, 2048);
        assert_eq!(cert.rank, 11);
        assert_eq!(cert.generators.len(), 11);
        assert_eq!(cert.anchor_positions.len(), 6);
        assert_eq!(
            cert.anchor_positions
                .iter()
                .map(|p| (p.row, p.col))
                .collect::<Vec<_>>(),
            vec![(0, 0), (8, 0), (16, 0), (24, 0), (32, 0), (40, 0)]
        );
        assert_eq!(cert.orbit_samples.len(), 6 * DEFAULT_SAMPLE_GRAY_INDICES.len());
        assert!(cert.orbit_samples.iter().all(|s| s.walked == s.folded));
        assert_eq!(cert.checksum.len(), 64);
    }

    #[test]
    fn at_cert_02_checksum_is_reproducible() {
        let a = build_certificate().unwrap();
        let b = build_certificate().unwrap();
        assert_eq!(a.checksum, b.checksum);
        assert!(verify_checksum(&a).unwrap());
    }

    #[test]
    fn at_cert_03_changing_the_anchor_set_changes_the_checksum() {
        let full = build_certificate().unwrap();
        let partial = CertificateBuilder::new()
            .with_anchors([0, 1, 2, 3, 4])
            .unwrap()
            .build()
            .unwrap();
        assert_ne!(full.checksum, partial.checksum);
        assert_eq!(partial.anchors, 5);
    }

    #[test]
    fn at_cert_04_tampering_is_detected() {
        let mut cert = build_certificate().unwrap();
        cert.orbit_samples[3].walked.col ^= 1;
        assert!(!verify_checksum(&cert).unwrap());
    }

    #[test]
    fn at_cert_05_last_sample_reaches_far_corner_of_orbit() {
        let cert = build_certificate().unwrap();
        let last = cert
            .orbit_samples
            .iter()
            .find(|s| s.anchor == 5 && s.gray_index == 2047)
            .unwrap();
        assert_eq!(last.gray_code, 1024);
        assert_eq!((last.walked.row, last.walked.col), (44, 0));
    }

    #[test]
    fn at_cert_07_samples_match_direct_group_action() {
        let cert = build_certificate().unwrap();
        for s in &cert.orbit_samples {
            let base = anchor_base(u32::from(s.anchor)).unwrap();
            let pos = act(base, s.gray_code);
            assert_eq!((pos.row, pos.col), (s.walked.row, s.walked.col));
            assert_eq!(gray11_inverse(s.gray_code), s.gray_index);
        }
    }

    #[test]
    fn at_cert_06_builder_rejects_bad_inputs() {
        assert!(CertificateBuilder::new().with_anchors([6]).is_err());
        assert!(CertificateBuilder::new()
            .with_anchors(std::iter::empty())
            .is_err());
        assert!(CertificateBuilder::new()
            .with_sample_gray_indices([2048])
            .is_err());
    }
}

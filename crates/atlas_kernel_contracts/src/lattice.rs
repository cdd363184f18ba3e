#![forbid(unsafe_code)]

//! Address space of the 96 x 12,288 boundary lattice.
//!
//! Every class carries 12,288 coordinates laid out as 6 anchors x 2048 orbit points:
//!
//! ```text
//! coord_idx = anchor * ORBIT + v_bits        anchor in [0,6), v_bits in [0,2048)
//! coord_idx = row * FOLD_COLS + col          row in [0,48),   col in [0,256)
//! ```
//!
//! `class_id` is an independent dimension and is not constrained by either relation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ContractViolation, Validate};

pub const CLASSES: u32 = 96;
pub const ANCHORS: u32 = 6;
pub const ORBIT: u32 = 2048;
pub const ORBIT_RANK: u32 = 11;
pub const COORDS_PER_CLASS: u32 = ANCHORS * ORBIT;
pub const FOLD_ROWS: u32 = 48;
pub const FOLD_COLS: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatticeField {
    ClassId,
    CoordIdx,
    Anchor,
    VBits,
    Row,
    Col,
}

impl LatticeField {
    pub fn as_str(self) -> &'static str {
        match self {
            LatticeField::ClassId => "class_id",
            LatticeField::CoordIdx => "coord_idx",
            LatticeField::Anchor => "anchor",
            LatticeField::VBits => "v_bits",
            LatticeField::Row => "row",
            LatticeField::Col => "col",
        }
    }
}

impl fmt::Display for LatticeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bound of a combined (class, coord) address that `verify_address` rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressBound {
    ClassOutOfRange,
    CoordOutOfRange,
}

impl AddressBound {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressBound::ClassOutOfRange => "class_id out of range",
            AddressBound::CoordOutOfRange => "coord_idx out of range",
        }
    }
}

impl fmt::Display for AddressBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatticeError {
    #[error("{field}={got} outside [0, {bound})")]
    Range {
        field: LatticeField,
        got: u32,
        bound: u32,
    },
    #[error("address rejected: {bound} (got {got}, limit {limit})")]
    Address {
        bound: AddressBound,
        got: u32,
        limit: u32,
    },
    #[error("incomplete step context: {reason}")]
    Incomplete { reason: &'static str },
    #[error("coord_idx={supplied_coord} disagrees with anchor/v_bits encoding {encoded_coord}")]
    Consistency {
        supplied_coord: u32,
        encoded_coord: u32,
    },
    #[error("certificate self-check failed: {0}")]
    Certificate(String),
    #[error("ledger entry {index}: {reason}")]
    LedgerValidation { index: usize, reason: String },
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub row: u8,
    pub col: u8,
}

/// Fully populated, immutable lattice address.
///
/// Only constructible through [`LatticeAddress::v1`], which checks both coordinate relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LatticeAddress {
    class_id: u8,
    coord_idx: u16,
    anchor: u8,
    v_bits: u16,
    row: u8,
    col: u8,
}

impl LatticeAddress {
    pub fn v1(
        class_id: u8,
        coord_idx: u16,
        anchor: u8,
        v_bits: u16,
        row: u8,
        col: u8,
    ) -> Result<Self, ContractViolation> {
        let addr = Self {
            class_id,
            coord_idx,
            anchor,
            v_bits,
            row,
            col,
        };
        addr.validate()?;
        Ok(addr)
    }

    pub fn class_id(&self) -> u8 {
        self.class_id
    }

    pub fn coord_idx(&self) -> u16 {
        self.coord_idx
    }

    pub fn anchor(&self) -> u8 {
        self.anchor
    }

    pub fn v_bits(&self) -> u16 {
        self.v_bits
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn col(&self) -> u8 {
        self.col
    }

    pub fn grid(&self) -> GridPos {
        GridPos {
            row: self.row,
            col: self.col,
        }
    }
}

impl Validate for LatticeAddress {
    fn validate(&self) -> Result<(), ContractViolation> {
        check_below("lattice_address.class_id", u32::from(self.class_id), CLASSES)?;
        check_below(
            "lattice_address.coord_idx",
            u32::from(self.coord_idx),
            COORDS_PER_CLASS,
        )?;
        check_below("lattice_address.anchor", u32::from(self.anchor), ANCHORS)?;
        check_below("lattice_address.v_bits", u32::from(self.v_bits), ORBIT)?;
        check_below("lattice_address.row", u32::from(self.row), FOLD_ROWS)?;
        let coord = u32::from(self.coord_idx);
        if coord != u32::from(self.anchor) * ORBIT + u32::from(self.v_bits) {
            return Err(ContractViolation::InvalidValue {
                field: "lattice_address.coord_idx",
                reason: "must equal anchor * 2048 + v_bits",
            });
        }
        if coord != u32::from(self.row) * FOLD_COLS + u32::from(self.col) {
            return Err(ContractViolation::InvalidValue {
                field: "lattice_address.coord_idx",
                reason: "must equal row * 256 + col",
            });
        }
        Ok(())
    }
}

fn check_below(field: &'static str, got: u32, bound: u32) -> Result<(), ContractViolation> {
    if got >= bound {
        return Err(ContractViolation::InvalidRange {
            field,
            min: 0,
            max: u64::from(bound - 1),
            got: u64::from(got),
        });
    }
    Ok(())
}

/// The two accepted input shapes of a step context, plus their redundant combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepCoordinates {
    Linear { coord_idx: u32 },
    AnchorOffset { anchor: u32, v_bits: u32 },
    Both { coord_idx: u32, anchor: u32, v_bits: u32 },
}

impl StepCoordinates {
    /// Builds the tagged shape from loosely supplied fields (ledger records, CLI flags).
    pub fn from_parts(
        coord_idx: Option<u32>,
        anchor: Option<u32>,
        v_bits: Option<u32>,
    ) -> Result<Self, LatticeError> {
        match (coord_idx, anchor, v_bits) {
            (Some(coord_idx), Some(anchor), Some(v_bits)) => Ok(StepCoordinates::Both {
                coord_idx,
                anchor,
                v_bits,
            }),
            (Some(coord_idx), None, None) => Ok(StepCoordinates::Linear { coord_idx }),
            (None, Some(anchor), Some(v_bits)) => {
                Ok(StepCoordinates::AnchorOffset { anchor, v_bits })
            }
            (Some(_), _, _) => Err(LatticeError::Incomplete {
                reason: "anchor and v_bits must be supplied together",
            }),
            (None, Some(_), None) | (None, None, Some(_)) => Err(LatticeError::Incomplete {
                reason: "anchor and v_bits must be supplied together",
            }),
            (None, None, None) => Err(LatticeError::Incomplete {
                reason: "context must include either coord or (anchor, v_bits)",
            }),
        }
    }
}

/// Caller-side step context, before guarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub class_id: u32,
    pub coordinates: StepCoordinates,
    pub t: Option<u64>,
    pub metadata: BTreeMap<String, String>,
}

impl StepContext {
    pub fn new(class_id: u32, coordinates: StepCoordinates) -> Self {
        Self {
            class_id,
            coordinates,
            t: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_step(mut self, t: u64) -> Self {
        self.t = Some(t);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Output of the context guard: the caller's fields plus every derived coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardedContext {
    #[serde(flatten)]
    pub address: LatticeAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<u64>,
    /// Caller metadata, kept apart from the address fields.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#![forbid(unsafe_code)]

//! (Z/2)^11 action on the 48 x 256 grid.
//!
//! Generators 0..8 flip one bit of the column. Generators 8..11 flip one of the low three
//! bits of the row's mod-16 component, using the mixed-radix split
//! `row = 16 * (row div 16) + (row mod 16)` of Z/48 into a Z/16 half and a 3-valued half
//! that the generators never touch.
//!
//! Orbit offsets map onto generators bit for bit: bit `k` of `v_bits` is generator `k`.
//! Walking an orbit in Gray order applies exactly one generator per step, the one at the
//! lowest set bit of the Gray index.

use atlas_kernel_contracts::certificate::{GeneratorDescriptor, GeneratorTarget};
use atlas_kernel_contracts::lattice::{
    GridPos, LatticeError, LatticeField, ANCHORS, ORBIT, ORBIT_RANK,
};

pub const COLUMN_GENERATORS: u8 = 8;
pub const ROW_GENERATORS: u8 = 3;
pub const GENERATOR_COUNT: u8 = COLUMN_GENERATORS + ROW_GENERATORS;
pub const ANCHOR_ROW_STRIDE: u8 = 8;

const ROW_RESIDUE_MODULUS: u8 = 16;
const GRAY_MASK: u16 = (ORBIT - 1) as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generator(u8);

impl Generator {
    pub fn new(index: u8) -> Result<Self, LatticeError> {
        if index >= GENERATOR_COUNT {
            return Err(LatticeError::Certificate(format!(
                "generator index {index} outside [0, {GENERATOR_COUNT})"
            )));
        }
        Ok(Self(index))
    }

    pub fn all() -> impl Iterator<Item = Generator> {
        (0..GENERATOR_COUNT).map(Generator)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn target(self) -> GeneratorTarget {
        if self.0 < COLUMN_GENERATORS {
            GeneratorTarget::Column
        } else {
            GeneratorTarget::RowResidue16
        }
    }

    /// Bit flipped within the targeted component.
    pub fn bit(self) -> u8 {
        match self.target() {
            GeneratorTarget::Column => self.0,
            GeneratorTarget::RowResidue16 => self.0 - COLUMN_GENERATORS,
        }
    }

    pub fn apply(self, pos: GridPos) -> GridPos {
        match self.target() {
            GeneratorTarget::Column => GridPos {
                row: pos.row,
                col: pos.col ^ (1u8 << self.bit()),
            },
            GeneratorTarget::RowResidue16 => {
                let hi = pos.row / ROW_RESIDUE_MODULUS;
                let lo = (pos.row % ROW_RESIDUE_MODULUS) ^ (1u8 << self.bit());
                GridPos {
                    row: hi * ROW_RESIDUE_MODULUS + lo,
                    col: pos.col,
                }
            }
        }
    }

    pub fn descriptor(self) -> GeneratorDescriptor {
        let description = match self.target() {
            GeneratorTarget::Column => format!("col XOR (1 << {})", self.bit()),
            GeneratorTarget::RowResidue16 => {
                format!("flip bit {} of row mod 16, row div 16 fixed", self.bit())
            }
        };
        GeneratorDescriptor {
            index: self.0,
            target: self.target(),
            bit: self.bit(),
            description,
        }
    }
}

/// 11-bit reflected Gray code.
pub fn gray11(index: u16) -> u16 {
    (index ^ (index >> 1)) & GRAY_MASK
}

pub fn gray11_inverse(code: u16) -> u16 {
    let mut code = code & GRAY_MASK;
    let mut index = code;
    while code > 0 {
        code >>= 1;
        index ^= code;
    }
    index
}

/// Base grid position of an anchor's orbit: `(8 * anchor, 0)`.
pub fn anchor_base(anchor: u32) -> Result<GridPos, LatticeError> {
    if anchor >= ANCHORS {
        return Err(LatticeError::Range {
            field: LatticeField::Anchor,
            got: anchor,
            bound: ANCHORS,
        });
    }
    Ok(GridPos {
        row: anchor as u8 * ANCHOR_ROW_STRIDE,
        col: 0,
    })
}

/// Applies the group element named by `v_bits` (one generator per set bit).
pub fn act(pos: GridPos, v_bits: u16) -> GridPos {
    Generator::all()
        .filter(|g| v_bits & (1u16 << g.index()) != 0)
        .fold(pos, |p, g| g.apply(p))
}

/// Gray-ordered walk over one anchor's orbit, one generator application per step.
#[derive(Debug, Clone)]
pub struct GrayWalk {
    pos: GridPos,
    next_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkStep {
    pub gray_index: u16,
    pub gray_code: u16,
    pub pos: GridPos,
}

impl GrayWalk {
    pub fn from_anchor(anchor: u32) -> Result<Self, LatticeError> {
        Ok(Self {
            pos: anchor_base(anchor)?,
            next_index: 0,
        })
    }
}

impl Iterator for GrayWalk {
    type Item = WalkStep;

    fn next(&mut self) -> Option<WalkStep> {
        if self.next_index >= ORBIT {
            return None;
        }
        let index = self.next_index as u16;
        if index > 0 {
            let generator = Generator(index.trailing_zeros() as u8);
            self.pos = generator.apply(self.pos);
        }
        self.next_index += 1;
        Some(WalkStep {
            gray_index: index,
            gray_code: gray11(index),
            pos: self.pos,
        })
    }
}

pub fn group_order() -> u32 {
    1 << ORBIT_RANK
}

#![forbid(unsafe_code)]

//! Boundary lattice indexer.
//!
//! Pure bijections between the linear coordinate and its (anchor, v_bits) and (row, col)
//! forms. Out-of-range inputs are rejected, never clamped.

use atlas_kernel_contracts::lattice::{
    AddressBound, GridPos, LatticeError, LatticeField, ANCHORS, CLASSES, COORDS_PER_CLASS,
    FOLD_COLS, FOLD_ROWS, ORBIT,
};

fn ensure_below(field: LatticeField, got: u32, bound: u32) -> Result<(), LatticeError> {
    if got >= bound {
        return Err(LatticeError::Range { field, got, bound });
    }
    Ok(())
}

/// `(anchor, v_bits) -> anchor * 2048 + v_bits`.
pub fn encode(anchor: u32, v_bits: u32) -> Result<u16, LatticeError> {
    ensure_below(LatticeField::Anchor, anchor, ANCHORS)?;
    ensure_below(LatticeField::VBits, v_bits, ORBIT)?;
    Ok((anchor * ORBIT + v_bits) as u16)
}

/// `coord_idx -> (coord_idx div 2048, coord_idx mod 2048)`.
pub fn decode(coord_idx: u32) -> Result<(u8, u16), LatticeError> {
    ensure_below(LatticeField::CoordIdx, coord_idx, COORDS_PER_CLASS)?;
    Ok(((coord_idx / ORBIT) as u8, (coord_idx % ORBIT) as u16))
}

/// Row-major fold of the linear coordinate into the 48 x 256 grid.
pub fn fold(coord_idx: u32) -> Result<GridPos, LatticeError> {
    ensure_below(LatticeField::CoordIdx, coord_idx, COORDS_PER_CLASS)?;
    Ok(GridPos {
        row: (coord_idx / FOLD_COLS) as u8,
        col: (coord_idx % FOLD_COLS) as u8,
    })
}

pub fn unfold(row: u32, col: u32) -> Result<u16, LatticeError> {
    ensure_below(LatticeField::Row, row, FOLD_ROWS)?;
    ensure_below(LatticeField::Col, col, FOLD_COLS)?;
    Ok((row * FOLD_COLS + col) as u16)
}

/// Checks a combined (class, coord) address, reporting which bound failed.
pub fn verify_address(class_id: u32, coord_idx: u32) -> Result<(), LatticeError> {
    if class_id >= CLASSES {
        return Err(LatticeError::Address {
            bound: AddressBound::ClassOutOfRange,
            got: class_id,
            limit: CLASSES,
        });
    }
    if coord_idx >= COORDS_PER_CLASS {
        return Err(LatticeError::Address {
            bound: AddressBound::CoordOutOfRange,
            got: coord_idx,
            limit: COORDS_PER_CLASS,
        });
    }
    Ok(())
}

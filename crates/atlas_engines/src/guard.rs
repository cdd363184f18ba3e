#![forbid(unsafe_code)]

//! Context guard: validates a step context against the lattice and returns a fully
//! populated copy. Touches no shared state and never logs.

use atlas_kernel_contracts::lattice::{
    GuardedContext, LatticeAddress, LatticeError, StepContext, StepCoordinates,
};

use crate::lattice::{decode, encode, fold, verify_address};

/// Normalizes one address. Allocation-free; the building block of [`guard_context`].
pub fn guard_address(
    class_id: u32,
    coordinates: StepCoordinates,
) -> Result<LatticeAddress, LatticeError> {
    let coord_idx = match coordinates {
        StepCoordinates::Linear { coord_idx } => {
            verify_address(class_id, coord_idx)?;
            coord_idx
        }
        StepCoordinates::AnchorOffset { anchor, v_bits } => {
            let coord_idx = u32::from(encode(anchor, v_bits)?);
            verify_address(class_id, coord_idx)?;
            coord_idx
        }
        StepCoordinates::Both {
            coord_idx,
            anchor,
            v_bits,
        } => {
            verify_address(class_id, coord_idx)?;
            let encoded = u32::from(encode(anchor, v_bits)?);
            if encoded != coord_idx {
                return Err(LatticeError::Consistency {
                    supplied_coord: coord_idx,
                    encoded_coord: encoded,
                });
            }
            coord_idx
        }
    };

    let (anchor, v_bits) = decode(coord_idx)?;
    let pos = fold(coord_idx)?;
    let addr = LatticeAddress::v1(
        class_id as u8,
        coord_idx as u16,
        anchor,
        v_bits,
        pos.row,
        pos.col,
    )?;
    Ok(addr)
}

/// Validates and enriches a step context. The input is left untouched.
pub fn guard_context(ctx: &StepContext) -> Result<GuardedContext, LatticeError> {
    let address = guard_address(ctx.class_id, ctx.coordinates)?;
    Ok(GuardedContext {
        address,
        t: ctx.t,
        metadata: ctx.metadata.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_kernel_contracts::lattice::{AddressBound, LatticeField, CLASSES, COORDS_PER_CLASS};
    use proptest::prelude::*;

    fn assert_address(addr: &LatticeAddress, expected: (u8, u16, u8, u16, u8, u8)) {
        assert_eq!(
            (
                addr.class_id(),
                addr.coord_idx(),
                addr.anchor(),
                addr.v_bits(),
                addr.row(),
                addr.col()
            ),
            expected
        );
    }

    #[test]
    fn at_guard_01_linear_coordinate_is_enriched() {
        let ctx = StepContext::new(5, StepCoordinates::Linear { coord_idx: 1000 });
        let out = guard_context(&ctx).unwrap();
        assert_address(&out.address, (5, 1000, 0, 1000, 3, 232));
    }

    #[test]
    fn at_guard_02_anchor_offset_is_enriched() {
        let ctx = StepContext::new(
            10,
            StepCoordinates::AnchorOffset {
                anchor: 3,
                v_bits: 500,
            },
        );
        let out = guard_context(&ctx).unwrap();
        assert_address(&out.address, (10, 6644, 3, 500, 25, 244));
    }

    #[test]
    fn at_guard_03_conflicting_representations_fail() {
        let ctx = StepContext::new(
            5,
            StepCoordinates::Both {
                coord_idx: 1000,
                anchor: 1,
                v_bits: 1000,
            },
        );
        assert_eq!(
            guard_context(&ctx),
            Err(LatticeError::Consistency {
                supplied_coord: 1000,
                encoded_coord: 3048
            })
        );
    }

    #[test]
    fn at_guard_04_agreeing_representations_pass() {
        let ctx = StepContext::new(
            5,
            StepCoordinates::Both {
                coord_idx: 1000,
                anchor: 0,
                v_bits: 1000,
            },
        );
        let out = guard_context(&ctx).unwrap();
        assert_address(&out.address, (5, 1000, 0, 1000, 3, 232));
    }

    #[test]
    fn at_guard_05_out_of_range_inputs_are_not_clamped() {
        let bad_class = StepContext::new(96, StepCoordinates::Linear { coord_idx: 0 });
        assert!(matches!(
            guard_context(&bad_class),
            Err(LatticeError::Address {
                bound: AddressBound::ClassOutOfRange,
                ..
            })
        ));
        let bad_coord = StepContext::new(0, StepCoordinates::Linear { coord_idx: 12_288 });
        assert!(matches!(
            guard_context(&bad_coord),
            Err(LatticeError::Address {
                bound: AddressBound::CoordOutOfRange,
                ..
            })
        ));
        let bad_anchor = StepContext::new(
            0,
            StepCoordinates::AnchorOffset {
                anchor: 6,
                v_bits: 0,
            },
        );
        assert!(matches!(
            guard_context(&bad_anchor),
            Err(LatticeError::Range {
                field: LatticeField::Anchor,
                ..
            })
        ));
        let bad_class_offset = StepContext::new(
            200,
            StepCoordinates::AnchorOffset {
                anchor: 0,
                v_bits: 0,
            },
        );
        assert!(matches!(
            guard_context(&bad_class_offset),
            Err(LatticeError::Address {
                bound: AddressBound::ClassOutOfRange,
                ..
            })
        ));
    }

    #[test]
    fn at_guard_06_metadata_and_step_carry_through_without_mutating_input() {
        let ctx = StepContext::new(7, StepCoordinates::Linear { coord_idx: 4097 })
            .with_step(42)
            .with_metadata("ace", "ace_42");
        let before = ctx.clone();
        let out = guard_context(&ctx).unwrap();
        assert_eq!(ctx, before);
        assert_eq!(out.t, Some(42));
        assert_eq!(out.metadata.get("ace").map(String::as_str), Some("ace_42"));
        assert_eq!(out.address.anchor(), 2);
        assert_eq!(out.address.v_bits(), 1);
    }

    proptest! {
        #[test]
        fn at_guard_07_both_input_shapes_agree(
            class_id in 0..CLASSES,
            coord_idx in 0..COORDS_PER_CLASS,
        ) {
            let linear = guard_address(class_id, StepCoordinates::Linear { coord_idx }).unwrap();
            let offset = guard_address(
                class_id,
                StepCoordinates::AnchorOffset {
                    anchor: u32::from(linear.anchor()),
                    v_bits: u32::from(linear.v_bits()),
                },
            )
            .unwrap();
            prop_assert_eq!(linear, offset);
            let both = guard_address(
                class_id,
                StepCoordinates::Both {
                    coord_idx,
                    anchor: u32::from(linear.anchor()),
                    v_bits: u32::from(linear.v_bits()),
                },
            )
            .unwrap();
            prop_assert_eq!(linear, both);
        }

        #[test]
        fn at_guard_08_mismatched_pairs_always_conflict(
            class_id in 0..CLASSES,
            coord_idx in 0..COORDS_PER_CLASS,
            other in 0..COORDS_PER_CLASS,
        ) {
            prop_assume!(coord_idx != other);
            let anchor = other / 2048;
            let v_bits = other % 2048;
            let out = guard_address(
                class_id,
                StepCoordinates::Both { coord_idx, anchor, v_bits },
            );
            let is_conflict = matches!(out, Err(LatticeError::Consistency { .. }));
            prop_assert!(is_conflict);
        }
    }
}

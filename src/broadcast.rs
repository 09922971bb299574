// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Broadcast resolver (C2): align operand shapes to a common iteration
//! shape, and compute each operand's broadcast strides once aligned.
//!
//! Grounded on the right-align + unify-or-fail shape algebra in the
//! teacher's `src/dimension/broadcast.rs`, generalized from its
//! two-operand, statically-ranked form to an arbitrary number of
//! dynamically-ranked operands.

use crate::error::{ErrorKind, IterError, IterResult};

/// A single entry of a caller-supplied `op_axes` mapping: either an
/// existing operand axis, or a new size-1 axis inserted for this operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AxisSel {
    Axis(usize),
    NewAxis,
}

/// Resolve the broadcast shape of a set of operand shapes.
///
/// Right-aligns the shapes; for each axis position the resolved extent is
/// the unique non-1 value seen, or 1 if every operand is 1 there. Disagreeing
/// non-1 extents fail with [`ErrorKind::ShapeMismatch`].
pub fn broadcast_shapes(shapes: &[&[usize]]) -> IterResult<Vec<usize>> {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; ndim];
    for shape in shapes {
        let offset = ndim - shape.len();
        for (i, &extent) in shape.iter().enumerate() {
            let slot = &mut out[offset + i];
            if *slot == extent || extent == 1 {
                // keep *slot
            } else if *slot == 1 {
                *slot = extent;
            } else {
                return Err(IterError::new(
                    ErrorKind::ShapeMismatch,
                    format!("incompatible shapes: axis {} has {} and {}", offset + i, *slot, extent),
                ));
            }
        }
    }
    Ok(out)
}

/// Compute an operand's effective strides in the (right-aligned) broadcast
/// shape: missing leading axes get extent 1 / stride 0, and any axis where
/// the operand's own extent is 1 but the broadcast extent is greater gets
/// stride 0 regardless of the operand's original stride there.
pub fn broadcast_strides(iter_shape: &[usize], orig_shape: &[usize], orig_strides: &[isize]) -> Vec<isize> {
    let ndim = iter_shape.len();
    let offset = ndim - orig_shape.len();
    let mut out = vec![0isize; ndim];
    for i in 0..orig_shape.len() {
        if orig_shape[i] != 1 {
            out[offset + i] = orig_strides[i];
        }
        // orig_shape[i] == 1: stride stays 0 even if iter_shape matches 1,
        // since a size-1 axis never needs a nonzero stride.
    }
    out
}

/// Validate that an operand flagged `no_broadcast` already has exactly the
/// iteration shape (no missing leading axes, no size-1-to-N broadcasting).
pub fn check_no_broadcast(orig_shape: &[usize], iter_shape: &[usize]) -> IterResult<()> {
    let ndim = iter_shape.len();
    if orig_shape.len() != ndim {
        return Err(IterError::of(ErrorKind::BroadcastDenied));
    }
    if orig_shape.iter().zip(iter_shape.iter()).any(|(&a, &b)| a != b) {
        return Err(IterError::of(ErrorKind::BroadcastDenied));
    }
    Ok(())
}

/// Validate and apply a caller-supplied `op_axes` mapping: a length-`ndim`
/// sequence mapping each iteration axis to an operand axis (or to a newly
/// introduced size-1 axis).
///
/// Every *operand* axis must be covered by exactly one entry; duplicated or
/// out-of-range entries fail with [`ErrorKind::AxisMapInvalid`].
pub fn validate_op_axes(mapping: &[AxisSel], operand_ndim: usize) -> IterResult<()> {
    let mut seen = vec![false; operand_ndim];
    for &sel in mapping {
        if let AxisSel::Axis(a) = sel {
            if a >= operand_ndim {
                return Err(IterError::new(ErrorKind::AxisMapInvalid, format!("axis {} out of bounds (ndim {})", a, operand_ndim)));
            }
            if seen[a] {
                return Err(IterError::new(ErrorKind::AxisMapInvalid, format!("axis {} mapped more than once", a)));
            }
            seen[a] = true;
        }
    }
    if seen.iter().any(|&s| !s) {
        return Err(IterError::new(ErrorKind::AxisMapInvalid, "op_axes does not cover every operand axis"));
    }
    Ok(())
}

/// Reorder `(shape, strides)` for an operand according to a validated
/// `op_axes` mapping: iteration axis `i` pulls from operand axis
/// `mapping[i]`, or becomes a size-1/stride-0 axis for `NewAxis`.
pub fn apply_op_axes(mapping: &[AxisSel], orig_shape: &[usize], orig_strides: &[isize]) -> (Vec<usize>, Vec<isize>) {
    let mut shape = Vec::with_capacity(mapping.len());
    let mut strides = Vec::with_capacity(mapping.len());
    for &sel in mapping {
        match sel {
            AxisSel::Axis(a) => {
                shape.push(orig_shape[a]);
                strides.push(orig_strides[a]);
            }
            AxisSel::NewAxis => {
                shape.push(1);
                strides.push(0);
            }
        }
    }
    (shape, strides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcasts_right_aligned() {
        let a: &[usize] = &[3];
        let b: &[usize] = &[2, 1];
        let shape = broadcast_shapes(&[a, b]).unwrap();
        assert_eq!(shape, vec![2, 3]);
    }

    #[test]
    fn mismatched_non_one_extents_fail() {
        let a: &[usize] = &[2, 3];
        let b: &[usize] = &[2, 2];
        let err = broadcast_shapes(&[a, b]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn size_one_axis_gets_zero_stride() {
        let iter_shape = [2, 3];
        let orig_shape = [1, 3];
        let orig_strides = [99, 1];
        let strides = broadcast_strides(&iter_shape, &orig_shape, &orig_strides);
        assert_eq!(strides, vec![0, 1]);
    }

    #[test]
    fn missing_leading_axes_get_zero_stride() {
        let iter_shape = [2, 3];
        let orig_shape = [3];
        let orig_strides = [1];
        let strides = broadcast_strides(&iter_shape, &orig_shape, &orig_strides);
        assert_eq!(strides, vec![0, 1]);
    }

    #[test]
    fn no_broadcast_requires_exact_shape() {
        assert!(check_no_broadcast(&[2, 3], &[2, 3]).is_ok());
        assert!(check_no_broadcast(&[1, 3], &[2, 3]).is_err());
    }

    #[test]
    fn op_axes_must_cover_every_axis_exactly_once() {
        let mapping = [AxisSel::Axis(0), AxisSel::Axis(0)];
        assert_eq!(validate_op_axes(&mapping, 2).unwrap_err().kind(), ErrorKind::AxisMapInvalid);
        let mapping = [AxisSel::Axis(0), AxisSel::NewAxis];
        assert!(validate_op_axes(&mapping, 1).is_ok());
    }
}

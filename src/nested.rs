// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Nested iterator (C7): split the iteration axes into an outer and inner
//! group that share one prepared operand set, so a caller can drive the
//! outer axes by hand (e.g. to parallelize across them) while the inner
//! group behaves like an ordinary dense cursor.
//!
//! Operands are prepared exactly once; every inner cursor this produces
//! points into that single prepared set via `Rc<RefCell<_>>`, rather than
//! re-running C1–C4 per outer position (the teacher's `Zip` makes the same
//! "prepare once, iterate many times" trade in `src/zip/mod.rs`).
//!
//! `axes[0]` and `axes[1]` (spec.md §4.6's groups `G₁`, `G₂`) may be any
//! partition of the iteration axes into two sets, in any order — not just
//! an ascending prefix/suffix split. Under `order=K`, axes may be flipped
//! and reordered *within* each group following §4.2's usual rule, scoped to
//! that group's own axes; under any other order, each group's axes keep
//! exactly the order the caller listed them in, with no reversal. This
//! implementation fixes the group count at two (`G₁` outer, `G₂` inner);
//! spec.md's "`G₁, G₂, …`" wording allows more, but every scenario in this
//! specification — including §8's S5 — only ever nests two groups, and two
//! groups is the shape the `NestedIters`/`InnerIter` cursor pair below
//! models. See `DESIGN.md` for that scope note.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::dtype::CastSafety;
use crate::error::{ErrorKind, IterError, IterResult};
use crate::flags::{GlobalFlags, Order};
use crate::operand::OperandSpec;
use crate::prepare::{prepare_with_groups, PreparedIteration};

/// Entry point: prepare `specs` once under `order` and split the resulting
/// iteration shape at the `axes[0]`/`axes[1]` group boundary.
pub fn nested_iters<'a>(
    specs: Vec<OperandSpec<'a>>,
    axes: [Vec<usize>; 2],
    order: Order,
    global: GlobalFlags,
    casting: CastSafety,
) -> IterResult<NestedIters<'a>> {
    if global.buffered {
        return Err(IterError::new(ErrorKind::CapabilityMissing, "nested_iters does not support buffered operands"));
    }

    let [g0, g1] = axes;
    let outer_len = g0.len();
    let groups = [g0, g1];
    let prepared = prepare_with_groups(&specs, &global, order, casting, &groups)?;

    let split = classify_split(&prepared, outer_len);
    let outer_shape = prepared.shape[..split].to_vec();
    let inner_shape = prepared.shape[split..].to_vec();

    Ok(NestedIters { shared: Rc::new(RefCell::new(prepared)), outer_shape, inner_shape, split, _marker: PhantomData })
}

/// Find the coalesced-axis index at which the outer/inner split falls.
/// `coalesce_groups` entries are *planned-position* indices (0..ndim, in
/// `order`'s chosen iteration order), and the group boundary passed to C3
/// always lands at planned position `outer_ndim` regardless of any
/// within-group reordering, since group membership is never split across
/// the boundary — only each group's own internal order may change.
fn classify_split(prepared: &PreparedIteration, outer_ndim: usize) -> usize {
    prepared
        .coalesce_groups
        .iter()
        .position(|group| group[0] >= outer_ndim)
        .unwrap_or(prepared.coalesce_groups.len())
}

pub struct NestedIters<'a> {
    shared: Rc<RefCell<PreparedIteration>>,
    outer_shape: Vec<usize>,
    inner_shape: Vec<usize>,
    split: usize,
    _marker: PhantomData<&'a ()>,
}

impl<'a> NestedIters<'a> {
    pub fn outer_shape(&self) -> &[usize] {
        &self.outer_shape
    }

    pub fn inner_shape(&self) -> &[usize] {
        &self.inner_shape
    }

    pub fn outer_len(&self) -> usize {
        self.outer_shape.iter().product()
    }

    pub fn operand_count(&self) -> usize {
        self.shared.borrow().operands.len()
    }

    /// Build an inner cursor fixed at `outer_coords` (length
    /// [`Self::outer_shape`]`.len()`).
    pub fn inner_at(&self, outer_coords: &[usize]) -> IterResult<InnerIter<'a>> {
        if outer_coords.len() != self.outer_shape.len() {
            return Err(IterError::new(ErrorKind::ShapeMismatch, "outer coordinate rank mismatch"));
        }
        for (c, &extent) in outer_coords.iter().zip(self.outer_shape.iter()) {
            if *c >= extent {
                return Err(IterError::new(ErrorKind::ShapeMismatch, "outer coordinate out of range"));
            }
        }
        let prepared = self.shared.borrow();
        let ndim_inner = self.inner_shape.len();
        let base_ptrs: Vec<*mut u8> = prepared
            .operands
            .iter()
            .map(|op| {
                let mut offset: isize = 0;
                for (k, &c) in outer_coords.iter().enumerate() {
                    offset += c as isize * op.backing.strides[k];
                }
                unsafe { op.backing.ptr.offset(offset * op.backing.dtype.itemsize as isize) }
            })
            .collect();
        let inner_strides: Vec<Vec<isize>> =
            prepared.operands.iter().map(|op| op.backing.strides[self.split..].to_vec()).collect();

        drop(prepared);
        Ok(InnerIter {
            shared: Rc::clone(&self.shared),
            base_ptrs,
            inner_strides,
            inner_shape: self.inner_shape.clone(),
            coords: vec![0; ndim_inner],
            finished: self.inner_shape.iter().any(|&e| e == 0),
            started: false,
            _marker: PhantomData,
        })
    }
}

/// A dense cursor over one outer position's inner axis group.
pub struct InnerIter<'a> {
    shared: Rc<RefCell<PreparedIteration>>,
    base_ptrs: Vec<*mut u8>,
    inner_strides: Vec<Vec<isize>>,
    inner_shape: Vec<usize>,
    coords: Vec<usize>,
    finished: bool,
    started: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a> InnerIter<'a> {
    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    pub fn operand_dtype(&self, index: usize) -> crate::dtype::Dtype {
        self.shared.borrow().operands[index].backing.dtype
    }

    pub fn current_ptr(&self, index: usize) -> *mut u8 {
        let mut offset: isize = 0;
        for (c, s) in self.coords.iter().zip(self.inner_strides[index].iter()) {
            offset += *c as isize * s;
        }
        let itemsize = self.shared.borrow().operands[index].backing.dtype.itemsize;
        unsafe { self.base_ptrs[index].offset(offset * itemsize as isize) }
    }

    pub fn advance(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.started = true;
        for axis in (0..self.inner_shape.len()).rev() {
            self.coords[axis] += 1;
            if self.coords[axis] < self.inner_shape[axis] {
                return true;
            }
            self.coords[axis] = 0;
        }
        self.finished = true;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Dtype;
    use crate::operand::{OperandSpec, RawArrayOperand};
    use crate::owned::c_strides;

    struct FakeArray {
        shape: Vec<usize>,
        strides: Vec<isize>,
        data: std::cell::RefCell<Vec<u8>>,
    }

    unsafe impl RawArrayOperand for FakeArray {
        fn shape(&self) -> &[usize] {
            &self.shape
        }
        fn strides(&self) -> &[isize] {
            &self.strides
        }
        fn dtype(&self) -> Dtype {
            Dtype::F64
        }
        fn as_mut_ptr(&self) -> *mut u8 {
            self.data.borrow_mut().as_mut_ptr()
        }
        fn writeable(&self) -> bool {
            true
        }
    }

    fn grid(shape: Vec<usize>, values: &[f64]) -> FakeArray {
        let strides = c_strides(&shape);
        let mut data = vec![0u8; values.len() * 8];
        for (i, v) in values.iter().enumerate() {
            data[i * 8..i * 8 + 8].copy_from_slice(&v.to_ne_bytes());
        }
        FakeArray { shape, strides, data: std::cell::RefCell::new(data) }
    }

    unsafe fn read_f64(ptr: *const u8) -> f64 {
        let mut b = [0u8; 8];
        std::ptr::copy_nonoverlapping(ptr, b.as_mut_ptr(), 8);
        f64::from_ne_bytes(b)
    }

    #[test]
    fn splits_a_matrix_into_outer_rows_and_inner_columns() {
        let a = grid(vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let nested = nested_iters(
            vec![OperandSpec::readonly(&a)],
            [vec![0], vec![1]],
            Order::C,
            GlobalFlags::default(),
            CastSafety::Safe,
        )
        .unwrap();
        assert_eq!(nested.outer_shape(), &[2]);
        assert_eq!(nested.inner_shape(), &[3]);

        let mut row0 = Vec::new();
        let mut inner = nested.inner_at(&[0]).unwrap();
        loop {
            row0.push(unsafe { read_f64(inner.current_ptr(0)) });
            if !inner.advance() {
                break;
            }
        }
        assert_eq!(row0, vec![1.0, 2.0, 3.0]);

        let mut row1 = Vec::new();
        let mut inner = nested.inner_at(&[1]).unwrap();
        loop {
            row1.push(unsafe { read_f64(inner.current_ptr(0)) });
            if !inner.advance() {
                break;
            }
        }
        assert_eq!(row1, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_axis_groups_that_do_not_partition_every_axis() {
        let a = grid(vec![2, 3], &[0.0; 6]);
        // axis 0 missing, axis 1 duplicated.
        let err =
            nested_iters(vec![OperandSpec::readonly(&a)], [vec![1], vec![1]], Order::C, GlobalFlags::default(), CastSafety::Safe)
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AxisMapInvalid);
    }

    #[test]
    fn supports_a_non_ascending_non_contiguous_group_split() {
        // spec.md §8 S5: a = arange(12).reshape(2,3,2), groups [[0,2],[1]].
        let values: Vec<f64> = (0..12).map(|v| v as f64).collect();
        let a = grid(vec![2, 3, 2], &values);
        let nested = nested_iters(
            vec![OperandSpec::readonly(&a)],
            [vec![0, 2], vec![1]],
            Order::K,
            GlobalFlags::default(),
            CastSafety::Safe,
        )
        .unwrap();
        assert_eq!(nested.outer_len(), 4);
        assert_eq!(nested.inner_shape(), &[3]);

        let mut rows = Vec::new();
        for oc in [[0, 0], [0, 1], [1, 0], [1, 1]] {
            let mut inner = nested.inner_at(&oc).unwrap();
            let mut row = Vec::new();
            loop {
                row.push(unsafe { read_f64(inner.current_ptr(0)) });
                if !inner.advance() {
                    break;
                }
            }
            rows.push(row);
        }
        assert_eq!(
            rows,
            vec![vec![0.0, 2.0, 4.0], vec![1.0, 3.0, 5.0], vec![6.0, 8.0, 10.0], vec![7.0, 9.0, 11.0]]
        );
    }

    #[test]
    fn order_c_preserves_each_groups_caller_given_axis_order() {
        // Same array/groups as the K-order test above, but `order=C`: group
        // internal order must stay exactly [0, 2] (no reordering, even
        // though axis 0 has the larger stride in both orders here).
        let values: Vec<f64> = (0..12).map(|v| v as f64).collect();
        let a = grid(vec![2, 3, 2], &values);
        let nested = nested_iters(
            vec![OperandSpec::readonly(&a)],
            [vec![0, 2], vec![1]],
            Order::C,
            GlobalFlags::default(),
            CastSafety::Safe,
        )
        .unwrap();
        let mut inner = nested.inner_at(&[0, 0]).unwrap();
        let mut row = Vec::new();
        loop {
            row.push(unsafe { read_f64(inner.current_ptr(0)) });
            if !inner.advance() {
                break;
            }
        }
        assert_eq!(row, vec![0.0, 2.0, 4.0]);
    }
}

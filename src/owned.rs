// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A minimal owned, contiguous, byte-addressed buffer.
//!
//! The array container itself is out of scope for this crate (spec.md
//! §1); this type exists only to back the two places the iterator must
//! own storage without a caller-supplied array: allocated output operands
//! (C4, §4.7) and internal working copies (C4/C5). It plays the narrow
//! role the teacher's `OwnedRepr` plays for `ArrayBase` (`src/data_repr.rs`),
//! minus everything about generic element types and views.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::dtype::Dtype;
use crate::operand::RawArrayOperand;

/// Owned, heap-allocated, dtype-aligned storage with an explicit
/// shape/stride pair.
pub struct OwnedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
    shape: Vec<usize>,
    strides: Vec<isize>,
    dtype: Dtype,
}

fn total_elems(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major (C) contiguous strides, in elements, for `shape`.
pub fn c_strides(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc: isize = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = if shape[i] == 1 { 0 } else { acc };
        acc *= shape[i].max(1) as isize;
    }
    strides
}

/// Strides, in elements, laying `shape` out contiguously when traversed in
/// `axis_order` (outermost axis first) — used to match an allocated
/// output's memory layout to the iteration plan (spec.md §4.7).
pub fn strides_for_order(shape: &[usize], axis_order: &[usize]) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc: isize = 1;
    for &axis in axis_order.iter().rev() {
        strides[axis] = if shape[axis] == 1 { 0 } else { acc };
        acc *= shape[axis].max(1) as isize;
    }
    strides
}

impl OwnedBuffer {
    fn alloc(shape: Vec<usize>, strides: Vec<isize>, dtype: Dtype) -> Self {
        let n = total_elems(&shape).max(1);
        let size = n * dtype.itemsize;
        let align = dtype.itemsize.max(1).next_power_of_two();
        let layout = Layout::from_size_align(size.max(1), align).expect("valid buffer layout");
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        OwnedBuffer { ptr, layout, shape, strides, dtype }
    }

    /// A zero-initialized, C-contiguous buffer of `shape` and `dtype`.
    pub fn zeros(shape: &[usize], dtype: Dtype) -> Self {
        let strides = c_strides(shape);
        Self::alloc(shape.to_vec(), strides, dtype)
    }

    /// A zero-initialized buffer laid out contiguously for `axis_order`
    /// (spec.md §4.7's "memory layout matching the planned iteration order").
    pub fn zeros_with_order(shape: &[usize], dtype: Dtype, axis_order: &[usize]) -> Self {
        let strides = strides_for_order(shape, axis_order);
        Self::alloc(shape.to_vec(), strides, dtype)
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// SAFETY: `as_mut_ptr` returns a pointer valid for `shape`/`strides`-reachable
// offsets within the allocation sized in `alloc`; the buffer is always
// writeable since it is exclusively owned.
unsafe impl RawArrayOperand for OwnedBuffer {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn strides(&self) -> &[isize] {
        &self.strides
    }

    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn writeable(&self) -> bool {
        true
    }
}

// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The iterator core (C6): a cursor over the operands C1–C5 prepared,
//! plus the public builder that assembles it.

use std::marker::PhantomData;

use crate::buffer::check_buffer_write_merge;
use crate::dtype::{CastSafety, Dtype};
use crate::error::{ErrorKind, IterError, IterResult};
use crate::flags::{GlobalFlags, Order};
use crate::operand::OperandSpec;
use crate::prepare::{flush_writeback, prepare, PreparedIteration};

pub const DEFAULT_BUFFERSIZE: usize = 8192;

/// Decompose a linear index into (outer multi-index, inner offset), where
/// `outer_shape` is traversed row-major (last axis fastest) and the inner
/// axis (size `inner_extent`) is fastest of all.
fn decompose(mut idx: usize, outer_shape: &[usize], inner_extent: usize) -> (Vec<usize>, usize) {
    let inner_pos = idx % inner_extent.max(1);
    idx /= inner_extent.max(1);
    let mut coords = vec![0usize; outer_shape.len()];
    for axis in (0..outer_shape.len()).rev() {
        let extent = outer_shape[axis].max(1);
        coords[axis] = idx % extent;
        idx /= extent;
    }
    (coords, inner_pos)
}

fn compose(coords: &[usize], inner_pos: usize, outer_shape: &[usize], inner_extent: usize) -> usize {
    let mut idx = 0usize;
    for axis in 0..outer_shape.len() {
        idx = idx * outer_shape[axis].max(1) + coords[axis];
    }
    idx * inner_extent.max(1) + inner_pos
}

/// Row-major (C) flat index of `coords` against `shape` (last axis fastest).
fn row_major_flat(coords: &[usize], shape: &[usize]) -> usize {
    let mut idx = 0usize;
    for axis in 0..shape.len() {
        idx = idx * shape[axis] + coords[axis];
    }
    idx
}

/// Column-major (F) flat index of `coords` against `shape` (first axis fastest).
fn col_major_flat(coords: &[usize], shape: &[usize]) -> usize {
    let mut idx = 0usize;
    for axis in (0..shape.len()).rev() {
        idx = idx * shape[axis] + coords[axis];
    }
    idx
}

/// A cursor that walks the broadcast, planned, and coalesced iteration
/// space of a set of operands, exposing a contiguous pointer+length per
/// operand at each step.
///
/// Construct via [`NdIterBuilder`]. Borrows nothing directly (operand
/// pointers were captured by [`crate::prepare::prepare`]); `'a` ties this
/// cursor's lifetime to the operands it was built from.
pub struct NdIter<'a> {
    prepared: PreparedIteration,
    global: GlobalFlags,
    outer_shape: Vec<usize>,
    inner_extent: usize,
    coords: Vec<usize>,
    inner_pos: usize,
    current_len: usize,
    inner_loop: bool,
    finished: bool,
    started: bool,
    range_start: usize,
    range_end: usize,
    finalized: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a> NdIter<'a> {
    fn new(prepared: PreparedIteration, global: GlobalFlags) -> IterResult<Self> {
        let ndim = prepared.shape.len();
        let inner_loop = !global.no_inner_iteration;
        let (outer_shape, inner_extent) = if ndim == 0 || !inner_loop {
            (prepared.shape.clone(), 1)
        } else {
            (prepared.shape[..ndim - 1].to_vec(), prepared.shape[ndim - 1])
        };
        let itersize: usize = prepared.shape.iter().product();
        let coords = vec![0usize; outer_shape.len()];

        for op in &prepared.operands {
            if op.buffer.is_some() {
                let inner_broadcast = *op.broadcast_axis.last().unwrap_or(&false);
                check_buffer_write_merge(op.mode, inner_broadcast)?;
            }
        }

        let mut it = NdIter {
            prepared,
            global,
            outer_shape,
            inner_extent,
            coords,
            inner_pos: 0,
            current_len: 0,
            inner_loop,
            finished: itersize == 0,
            started: false,
            range_start: 0,
            range_end: itersize,
            finalized: false,
            _marker: PhantomData,
        };
        if !it.finished {
            it.current_len = it.next_chunk_len();
            it.refill_current_chunk();
        }
        Ok(it)
    }

    fn full_coords(&self) -> Vec<usize> {
        if self.inner_loop {
            let mut c = self.coords.clone();
            c.push(self.inner_pos);
            c
        } else {
            self.coords.clone()
        }
    }

    fn flat_index(&self) -> usize {
        compose(&self.coords, self.inner_pos, &self.outer_shape, self.inner_extent)
    }

    fn next_chunk_len(&self) -> usize {
        let remaining = self.inner_extent - self.inner_pos;
        if !self.inner_loop {
            return remaining.min(1);
        }
        let mut len = remaining;
        for op in &self.prepared.operands {
            if let Some(buf) = &op.buffer {
                let identity_ok = op.backing.dtype == buf.dtype();
                len = len.min(crate::buffer::chunk_len(remaining, buf.capacity(), self.global.growinner, identity_ok));
            }
        }
        len.max(1).min(remaining.max(1))
    }

    fn refill_current_chunk(&mut self) {
        let coords = self.full_coords();
        let len = self.current_len;
        for op in &mut self.prepared.operands {
            if let Some(buf) = &mut op.buffer {
                let stride = *op.backing.strides.last().unwrap_or(&0);
                let ptr = unsafe { op.backing.ptr_at(&coords) };
                unsafe { buf.refill(ptr, stride, op.backing.dtype, len) };
            }
        }
    }

    fn flush_current_chunk(&mut self) {
        if !self.started {
            return;
        }
        let coords = self.full_coords();
        for op in &self.prepared.operands {
            if let Some(buf) = &op.buffer {
                let stride = *op.backing.strides.last().unwrap_or(&0);
                let ptr = unsafe { op.backing.ptr_at(&coords) };
                unsafe { buf.flush(ptr, stride, op.backing.dtype) };
            }
        }
    }

    /// Advance one step; returns `false` once iteration is complete.
    ///
    /// Flushes any buffered chunk currently staged before moving on, so
    /// callers never need to flush manually mid-iteration.
    pub fn advance(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.flush_current_chunk();
        self.started = true;

        self.inner_pos += self.current_len;
        if self.inner_pos >= self.inner_extent {
            self.inner_pos = 0;
            if !self.step_outer() {
                self.finished = true;
                return false;
            }
        }
        if self.flat_index() >= self.range_end {
            self.finished = true;
            return false;
        }
        self.current_len = self.next_chunk_len();
        self.refill_current_chunk();
        true
    }

    fn step_outer(&mut self) -> bool {
        for axis in (0..self.outer_shape.len()).rev() {
            self.coords[axis] += 1;
            if self.coords[axis] < self.outer_shape[axis] {
                return true;
            }
            self.coords[axis] = 0;
        }
        false
    }

    /// Reset the cursor back to the start of its range.
    pub fn reset(&mut self) {
        self.flush_current_chunk();
        self.coords.iter_mut().for_each(|c| *c = 0);
        self.inner_pos = 0;
        self.started = false;
        let itersize: usize = self.prepared.shape.iter().product();
        self.finished = self.range_start >= itersize.min(self.range_end);
        if !self.finished {
            self.set_iterindex(self.range_start).ok();
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn ndim(&self) -> usize {
        self.prepared.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.prepared.shape
    }

    pub fn itersize(&self) -> usize {
        self.prepared.shape.iter().product()
    }

    pub fn operand_count(&self) -> usize {
        self.prepared.operands.len()
    }

    pub fn operand_dtype(&self, index: usize) -> Dtype {
        let op = &self.prepared.operands[index];
        op.buffer.as_ref().map(|b| b.dtype()).unwrap_or(op.backing.dtype)
    }

    /// Base pointer to operand `index`'s data for the current chunk.
    pub fn current_ptr(&self, index: usize) -> *mut u8 {
        let op = &self.prepared.operands[index];
        if let Some(buf) = &op.buffer {
            buf.as_mut_ptr()
        } else {
            let coords = self.full_coords();
            unsafe { op.backing.ptr_at(&coords) }
        }
    }

    /// Stride, in bytes, between consecutive elements of operand `index`'s
    /// current chunk (0 for a size-1/broadcast axis, dense for a buffer).
    pub fn current_stride(&self, index: usize) -> isize {
        let op = &self.prepared.operands[index];
        if op.buffer.is_some() {
            op.backing.dtype.itemsize as isize
        } else {
            let s = op.backing.strides.last().copied().unwrap_or(0);
            s * op.backing.dtype.itemsize as isize
        }
    }

    /// Number of elements exposed this step (same for every operand).
    pub fn current_len(&self) -> usize {
        self.current_len.max(1)
    }

    /// Coordinates against the *original* operand shape (spec.md §4.1's
    /// coord/index agreement invariant): when the planner reversed or
    /// reordered axes for `order = K`/`A`, the raw iteration coordinate is
    /// mapped back through `plan.perm`/`plan.reverse` so indexing any
    /// operand's natural array at these coordinates agrees with
    /// [`Self::current_ptr`]. Requesting `coords` locks every axis boundary
    /// (see `lock_axes` in `prepare.rs`), so the raw iteration coordinate
    /// always has exactly one entry per natural axis here.
    fn natural_coords(&self) -> Vec<usize> {
        let iter_coords = self.full_coords();
        let plan = &self.prepared.plan;
        let natural_shape = &self.prepared.natural_shape;
        let mut natural = vec![0usize; plan.perm.len()];
        for (k, &axis) in plan.perm.iter().enumerate() {
            let c = iter_coords[k];
            natural[axis] = if plan.reverse[axis] { natural_shape[axis] - 1 - c } else { c };
        }
        natural
    }

    pub fn coords(&self) -> IterResult<Vec<usize>> {
        if !self.global.coords {
            return Err(IterError::of(ErrorKind::CapabilityMissing));
        }
        Ok(self.natural_coords())
    }

    /// Row-major flat index over the natural (pre-planning) broadcast
    /// shape, tracked from the iteration coordinates regardless of which
    /// `order` the planner actually used (spec.md §4.1, line 146). When the
    /// plan is already an unflipped row-major traversal, the running
    /// iteration index already *is* this value; otherwise `lock_axes`
    /// (`prepare.rs`) keeps every axis boundary intact so the per-axis
    /// coordinate can be mapped back and recombined here.
    pub fn c_index(&self) -> IterResult<usize> {
        if !self.global.c_index {
            return Err(IterError::of(ErrorKind::CapabilityMissing));
        }
        if self.prepared.plan.is_row_major_unflipped() {
            return Ok(self.flat_index());
        }
        Ok(row_major_flat(&self.natural_coords(), &self.prepared.natural_shape))
    }

    /// Column-major counterpart of [`Self::c_index`].
    pub fn f_index(&self) -> IterResult<usize> {
        if !self.global.f_index {
            return Err(IterError::of(ErrorKind::CapabilityMissing));
        }
        if self.prepared.plan.is_col_major_unflipped() {
            return Ok(self.flat_index());
        }
        Ok(col_major_flat(&self.natural_coords(), &self.prepared.natural_shape))
    }

    pub fn iterindex(&self) -> usize {
        self.flat_index()
    }

    pub fn set_iterindex(&mut self, index: usize) -> IterResult<()> {
        let itersize = self.itersize();
        if index > itersize {
            return Err(IterError::new(ErrorKind::ShapeMismatch, "iterindex out of range"));
        }
        self.flush_current_chunk();
        let (coords, inner_pos) = decompose(index, &self.outer_shape, self.inner_extent);
        self.coords = coords;
        self.inner_pos = inner_pos;
        self.started = false;
        self.finished = index >= itersize || index >= self.range_end;
        if !self.finished {
            self.current_len = self.next_chunk_len();
            self.refill_current_chunk();
        }
        Ok(())
    }

    pub fn iterrange(&self) -> IterResult<(usize, usize)> {
        if !self.global.ranged {
            return Err(IterError::of(ErrorKind::CapabilityMissing));
        }
        Ok((self.range_start, self.range_end))
    }

    pub fn set_iterrange(&mut self, start: usize, end: usize) -> IterResult<()> {
        if !self.global.ranged {
            return Err(IterError::of(ErrorKind::CapabilityMissing));
        }
        if start > end || end > self.itersize() {
            return Err(IterError::new(ErrorKind::ShapeMismatch, "invalid iterrange"));
        }
        self.range_start = start;
        self.range_end = end;
        self.set_iterindex(start)
    }

    pub fn remove_coords(&mut self) {
        self.global.coords = false;
    }

    /// Disable the inner-axis grouping, so `advance` steps one element at
    /// a time along every axis. Only valid before the first `advance`.
    pub fn remove_inner_loop(&mut self) -> IterResult<()> {
        if self.started || self.inner_pos != 0 {
            return Err(IterError::of(ErrorKind::CapabilityMissing));
        }
        if !self.inner_loop {
            return Ok(());
        }
        self.inner_loop = false;
        self.outer_shape = self.prepared.shape.clone();
        self.inner_extent = 1;
        self.coords = vec![0usize; self.outer_shape.len()];
        self.current_len = 1;
        Ok(())
    }

    /// Flush any pending buffered writes and cast working copies back into
    /// their original backing (`updateifcopy` operands).
    pub fn finalize(mut self) -> IterResult<()> {
        self.do_finalize();
        Ok(())
    }

    fn do_finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.flush_current_chunk();
        for op in &self.prepared.operands {
            unsafe { flush_writeback(op, &self.prepared.shape) };
        }
        self.finalized = true;
    }
}

impl<'a> Drop for NdIter<'a> {
    fn drop(&mut self) {
        self.do_finalize();
    }
}

/// Builder for [`NdIter`] (spec.md §6's external construction surface).
pub struct NdIterBuilder<'a> {
    specs: Vec<OperandSpec<'a>>,
    global: GlobalFlags,
    order: Order,
    casting: CastSafety,
    buffersize: usize,
}

impl<'a> NdIterBuilder<'a> {
    pub fn new(specs: Vec<OperandSpec<'a>>) -> Self {
        NdIterBuilder { specs, global: GlobalFlags::default(), order: Order::K, casting: CastSafety::Safe, buffersize: DEFAULT_BUFFERSIZE }
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn casting(mut self, casting: CastSafety) -> Self {
        self.casting = casting;
        self
    }

    pub fn buffersize(mut self, size: usize) -> Self {
        self.buffersize = size.max(1);
        self
    }

    pub fn coords(mut self) -> Self {
        self.global.coords = true;
        self
    }

    pub fn c_index(mut self) -> Self {
        self.global.c_index = true;
        self
    }

    pub fn f_index(mut self) -> Self {
        self.global.f_index = true;
        self
    }

    pub fn no_inner_iteration(mut self) -> Self {
        self.global.no_inner_iteration = true;
        self
    }

    pub fn common_dtype(mut self) -> Self {
        self.global.common_dtype = true;
        self
    }

    pub fn buffered(mut self) -> Self {
        self.global.buffered = true;
        self
    }

    pub fn growinner(mut self) -> Self {
        self.global.growinner = true;
        self
    }

    pub fn ranged(mut self) -> Self {
        self.global.ranged = true;
        self
    }

    pub fn build(self) -> IterResult<NdIter<'a>> {
        let prepared = prepare(&self.specs, &self.global, self.order, self.casting, self.buffersize)?;
        NdIter::new(prepared, self.global)
    }
}

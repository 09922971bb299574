// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Buffer engine (C5): a per-operand scratch chunk that the cursor (C6)
//! refills from, and flushes back to, the real backing when buffering is
//! enabled.
//!
//! Grounded on the same ownership model as [`crate::owned::OwnedBuffer`]
//! (itself modeled on the teacher's `OwnedRepr`, `src/data_repr.rs`): a
//! buffer is just a small contiguous `OwnedBuffer` that gets refilled many
//! times over an iterator's life instead of once.

use crate::cast::cast_element;
use crate::dtype::Dtype;
use crate::error::{ErrorKind, IterError, IterResult};
use crate::flags::AccessMode;
use crate::operand::RawArrayOperand;
use crate::owned::OwnedBuffer;

/// A contiguous scratch chunk for one operand, in the operand's *effective*
/// dtype. The cursor (C6) copies real elements in before a chunk is
/// consumed (`refill`) and copies written elements back out after
/// (`flush`), casting/byte-swapping as needed at each boundary.
pub struct OperandBuffer {
    storage: OwnedBuffer,
    mode: AccessMode,
    capacity: usize,
    /// Number of valid elements currently staged (`<= capacity`); the last
    /// chunk of an axis is commonly shorter than `capacity`.
    len: usize,
}

impl OperandBuffer {
    pub fn new(dtype: Dtype, capacity: usize, mode: AccessMode) -> Self {
        let storage = OwnedBuffer::zeros(&[capacity], dtype);
        OperandBuffer { storage, mode, capacity, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn dtype(&self) -> Dtype {
        self.storage.dtype()
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.storage.as_mut_ptr()
    }

    /// Copy `count` elements from the real backing (`src_ptr`, strided by
    /// `src_stride` bytes, typed `src_dtype`) into the buffer, casting each
    /// one. No-op if this buffer is write-only (nothing to read back).
    ///
    /// # Safety
    ///
    /// `src_ptr` must be readable for `count` strided elements of
    /// `src_dtype.itemsize` bytes.
    pub unsafe fn refill(&mut self, src_ptr: *const u8, src_stride: isize, src_dtype: Dtype, count: usize) {
        debug_assert!(count <= self.capacity);
        self.len = count;
        if !self.mode.may_read() {
            return;
        }
        let dst_dtype = self.dtype();
        let base = self.storage.as_mut_ptr();
        for i in 0..count {
            let s = src_ptr.offset(i as isize * src_stride);
            let d = base.add(i * dst_dtype.itemsize);
            cast_element(s, src_dtype, d, dst_dtype);
        }
    }

    /// Copy the buffer's currently staged elements back to the real
    /// backing, casting each one. No-op if this buffer is read-only.
    ///
    /// # Safety
    ///
    /// `dst_ptr` must be writeable for `self.len()` strided elements of
    /// `dst_dtype.itemsize` bytes.
    pub unsafe fn flush(&self, dst_ptr: *mut u8, dst_stride: isize, dst_dtype: Dtype) {
        if !self.mode.may_write() {
            return;
        }
        let src_dtype = self.dtype();
        let base = self.storage.as_mut_ptr();
        for i in 0..self.len {
            let s = base.add(i * src_dtype.itemsize);
            let d = dst_ptr.offset(i as isize * dst_stride);
            cast_element(s, src_dtype, d, dst_dtype);
        }
    }
}

/// Enforce the `BufferWriteMerge` rule (spec.md §4.5/§7): a writeable
/// operand can't have a stride-0 (broadcast) axis inside the chunk being
/// buffered, since two or more logical positions would alias the same
/// real element and the flush order would silently pick a winner.
pub fn check_buffer_write_merge(mode: AccessMode, inner_axis_is_broadcast: bool) -> IterResult<()> {
    if mode.may_write() && inner_axis_is_broadcast {
        return Err(IterError::of(ErrorKind::BufferWriteMerge));
    }
    Ok(())
}

/// The chunk length to use for the innermost (buffered) axis this step,
/// respecting `growinner` (spec.md §6): when set and this operand needs no
/// cast/swap (`identity_ok`), the whole remaining inner extent is used
/// instead of being capped to the buffer's capacity.
pub fn chunk_len(remaining_inner: usize, capacity: usize, growinner: bool, identity_ok: bool) -> usize {
    if growinner && identity_ok {
        remaining_inner
    } else {
        remaining_inner.min(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Dtype;

    #[test]
    fn refill_casts_strided_source_into_dense_buffer() {
        let mut buf = OperandBuffer::new(Dtype::F64, 4, AccessMode::ReadOnly);
        let src: Vec<i32> = vec![10, 20, 30];
        unsafe {
            buf.refill(src.as_ptr() as *const u8, std::mem::size_of::<i32>() as isize, Dtype::I32, 3);
        }
        assert_eq!(buf.len(), 3);
        let out = unsafe { std::slice::from_raw_parts(buf.as_mut_ptr() as *const f64, 3) };
        assert_eq!(out, &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn flush_is_noop_for_readonly_buffer() {
        let buf = OperandBuffer::new(Dtype::F64, 2, AccessMode::ReadOnly);
        let mut dst = [9.0f64, 9.0];
        unsafe {
            buf.flush(dst.as_mut_ptr() as *mut u8, std::mem::size_of::<f64>() as isize, Dtype::F64);
        }
        assert_eq!(dst, [9.0, 9.0]);
    }

    #[test]
    fn write_merge_rejected_for_writeable_broadcast_axis() {
        assert!(check_buffer_write_merge(AccessMode::ReadWrite, true).is_err());
        assert!(check_buffer_write_merge(AccessMode::ReadOnly, true).is_ok());
    }

    #[test]
    fn chunk_len_honors_growinner() {
        assert_eq!(chunk_len(100, 8, true, true), 100);
        assert_eq!(chunk_len(100, 8, true, false), 8);
        assert_eq!(chunk_len(100, 8, false, true), 8);
    }
}

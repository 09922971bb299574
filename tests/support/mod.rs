// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shared harness for the integration tests: a minimal `RawArrayOperand`
//! implementation over a `Vec<u8>`, since the integration tests only see
//! the crate's public surface (unlike the in-module unit tests, they can't
//! reach `crate::owned::c_strides`).

#![allow(dead_code)]

use std::cell::RefCell;

use nditer::{Dtype, RawArrayOperand, SubtypeConstraint};

/// A fake array backed by a raw byte buffer, with caller-chosen shape,
/// strides (in elements), and a base-pointer offset (in elements) so a
/// test can construct a reversed or otherwise non-trivial view of the same
/// buffer without needing a real array container.
pub struct FakeArray {
    pub shape: Vec<usize>,
    pub strides: Vec<isize>,
    pub dtype: Dtype,
    pub data: RefCell<Vec<u8>>,
    pub base_offset: isize,
    pub writeable: bool,
}

unsafe impl RawArrayOperand for FakeArray {
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
        let base = self.data.borrow_mut().as_mut_ptr();
        unsafe { base.offset(self.base_offset * self.dtype.itemsize as isize) }
    }
    fn writeable(&self) -> bool {
        self.writeable
    }
}

/// Row-major (C) contiguous strides, in elements.
pub fn c_strides(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc: isize = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = if shape[i] == 1 { 0 } else { acc };
        acc *= shape[i].max(1) as isize;
    }
    strides
}

/// Column-major (F) contiguous strides, in elements.
pub fn f_strides(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc: isize = 1;
    for i in 0..shape.len() {
        strides[i] = if shape[i] == 1 { 0 } else { acc };
        acc *= shape[i].max(1) as isize;
    }
    strides
}

/// A [`FakeArray`] whose container subtype only ever holds a fixed rank
/// (spec.md §4.7), the way e.g. a 2-D matrix subtype would.
pub struct RankFixedArray {
    pub inner: FakeArray,
    pub rank: usize,
}

unsafe impl RawArrayOperand for RankFixedArray {
    fn shape(&self) -> &[usize] {
        self.inner.shape()
    }
    fn strides(&self) -> &[isize] {
        self.inner.strides()
    }
    fn dtype(&self) -> Dtype {
        self.inner.dtype()
    }
    fn as_mut_ptr(&self) -> *mut u8 {
        self.inner.as_mut_ptr()
    }
    fn writeable(&self) -> bool {
        self.inner.writeable()
    }
    fn subtype_constraint(&self) -> Option<SubtypeConstraint> {
        Some(SubtypeConstraint::Rank(self.rank))
    }
}

pub fn f64_array(shape: Vec<usize>, values: &[f64]) -> FakeArray {
    let strides = c_strides(&shape);
    let mut data = vec![0u8; values.len() * 8];
    for (i, v) in values.iter().enumerate() {
        data[i * 8..i * 8 + 8].copy_from_slice(&v.to_ne_bytes());
    }
    FakeArray { shape, strides, dtype: Dtype::F64, data: RefCell::new(data), base_offset: 0, writeable: true }
}

pub fn f32_array(shape: Vec<usize>, values: &[f32]) -> FakeArray {
    let strides = c_strides(&shape);
    let mut data = vec![0u8; values.len() * 4];
    for (i, v) in values.iter().enumerate() {
        data[i * 4..i * 4 + 4].copy_from_slice(&v.to_ne_bytes());
    }
    FakeArray { shape, strides, dtype: Dtype::F32, data: RefCell::new(data), base_offset: 0, writeable: true }
}

/// A swapped-byte-order f64 array holding `values` (each value is stored
/// reversed, so a byte-swapping cast is required to recover it).
pub fn f64_array_swapped(shape: Vec<usize>, values: &[f64]) -> FakeArray {
    let strides = c_strides(&shape);
    let mut data = vec![0u8; values.len() * 8];
    for (i, v) in values.iter().enumerate() {
        let mut bytes = v.to_ne_bytes();
        bytes.reverse();
        data[i * 8..i * 8 + 8].copy_from_slice(&bytes);
    }
    FakeArray { shape, strides, dtype: Dtype::F64.swapped(), data: RefCell::new(data), base_offset: 0, writeable: true }
}

pub unsafe fn read_f64(ptr: *const u8) -> f64 {
    let mut b = [0u8; 8];
    unsafe { std::ptr::copy_nonoverlapping(ptr, b.as_mut_ptr(), 8) };
    f64::from_ne_bytes(b)
}

pub unsafe fn write_f64(ptr: *mut u8, v: f64) {
    unsafe { std::ptr::copy_nonoverlapping(v.to_ne_bytes().as_ptr(), ptr, 8) };
}

pub unsafe fn read_f32(ptr: *const u8) -> f32 {
    let mut b = [0u8; 4];
    unsafe { std::ptr::copy_nonoverlapping(ptr, b.as_mut_ptr(), 4) };
    f32::from_ne_bytes(b)
}

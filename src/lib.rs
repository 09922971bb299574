// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A multi-operand, N-dimensional strided array iterator.
//!
//! `nditer` does not define an array type of its own. Instead, callers
//! implement [`RawArrayOperand`] for whatever array type they already have
//! (a dense buffer, a view, anything addressable by shape + strides + a raw
//! pointer), hand a set of operands to [`NdIterBuilder`], and get back an
//! [`NdIter`] cursor that:
//!
//! - broadcasts mismatched shapes together,
//! - works out the most efficient axis order and coalesces adjacent axes
//!   where every operand's strides allow it,
//! - casts between operand dtypes up to the requested [`CastSafety`] level,
//!   buffering through scratch chunks when the cast can't happen in place,
//! - and writes results back to `readwrite`/`allocate` operands when the
//!   iterator finishes (or is dropped).
//!
//! This mirrors the shape-unification and traversal-planning core of
//! numpy's `nditer`, built the way the `ndarray` crate builds its own
//! iteration core (`Zip`, `Layout`, the dimension module) rather than as a
//! literal port.
//!
//! # Example
//!
//! ```
//! use nditer::{CastSafety, Dtype, NdIterBuilder, OperandSpec, RawArrayOperand};
//!
//! struct Grid {
//!     shape: Vec<usize>,
//!     strides: Vec<isize>,
//!     data: Vec<f64>,
//! }
//!
//! unsafe impl RawArrayOperand for Grid {
//!     fn shape(&self) -> &[usize] { &self.shape }
//!     fn strides(&self) -> &[isize] { &self.strides }
//!     fn dtype(&self) -> Dtype { Dtype::F64 }
//!     fn as_mut_ptr(&self) -> *mut u8 { self.data.as_ptr() as *mut u8 }
//!     fn writeable(&self) -> bool { true }
//! }
//!
//! let a = Grid { shape: vec![2, 2], strides: vec![16, 8], data: vec![1.0, 2.0, 3.0, 4.0] };
//! let mut iter = NdIterBuilder::new(vec![OperandSpec::readonly(&a)])
//!     .casting(CastSafety::Safe)
//!     .build()
//!     .unwrap();
//! let mut sum = 0.0;
//! loop {
//!     sum += unsafe { *(iter.current_ptr(0) as *const f64) };
//!     if !iter.advance() { break; }
//! }
//! assert_eq!(sum, 10.0);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod broadcast;
mod buffer;
mod cast;
mod dtype;
mod error;
mod flags;
mod iter;
mod nested;
mod operand;
mod owned;
mod planner;
mod prepare;

pub use dtype::{ByteOrder, CastSafety, Dtype, TypeKind};
pub use error::{ErrorKind, IterError, IterResult};
pub use flags::{AccessMode, GlobalFlags, Order};
pub use iter::{NdIter, NdIterBuilder, DEFAULT_BUFFERSIZE};
pub use nested::{nested_iters, InnerIter, NestedIters};
pub use operand::{OperandFlags, OperandSpec, RawArrayOperand, SubtypeConstraint};

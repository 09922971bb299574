// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The operand seam: the trait any concrete array container implements so
//! the iterator can drive it, and the caller-facing per-operand spec.
//!
//! Plays the role the teacher's `NdProducer` trait plays for `Zip`
//! (`src/zip/mod.rs`): the iterator only ever touches operands through
//! this trait, never through a concrete array type, since the array
//! container itself is out of scope (spec.md §1).

use crate::broadcast::AxisSel;
use crate::dtype::Dtype;
use crate::flags::OperandFlags;

/// The minimal surface a concrete array type must expose to be driven by
/// [`crate::NdIter`]: shape, strides, a typed element format, base-pointer
/// access, and a writeable flag (spec.md §1).
///
/// # Safety
///
/// Implementors must guarantee that `as_mut_ptr()` is valid for reads (and,
/// if `writeable()`, writes) of `dtype().itemsize` bytes at every offset
/// reachable by `shape`/`strides`. Constructing two iterators with
/// overlapping write access to the same backing storage is the caller's
/// responsibility to avoid (spec.md §5); this trait cannot detect aliasing
/// across independent handles.
pub unsafe trait RawArrayOperand {
    fn shape(&self) -> &[usize];
    fn strides(&self) -> &[isize];
    fn dtype(&self) -> Dtype;
    fn as_mut_ptr(&self) -> *mut u8;
    fn writeable(&self) -> bool;

    fn ndim(&self) -> usize {
        self.shape().len()
    }

    fn is_scalar(&self) -> bool {
        self.ndim() == 0
    }

    fn is_aligned(&self) -> bool {
        (self.as_mut_ptr() as usize) % self.dtype().itemsize.max(1) == 0
    }

    /// The shape constraint, if any, that this operand's container subtype
    /// imposes on an allocated output (spec.md §4.7) — e.g. a fixed-rank
    /// container only ever accepting a particular number of dimensions.
    /// `None` (the default) means the container is an unconstrained,
    /// dynamic-shape array, which is the common case.
    fn subtype_constraint(&self) -> Option<SubtypeConstraint> {
        None
    }
}

/// A shape constraint a concrete operand type's subtype imposes on an
/// allocated output (spec.md §4.7), analogous to how the teacher
/// distinguishes a fixed-rank `Dimension` (`Ix2`, …) from the dynamic
/// `IxDyn`: some container types only ever hold a shape of a particular
/// rank, or only ever hold one exact shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubtypeConstraint {
    /// The subtype only ever holds shapes of this rank.
    Rank(usize),
    /// The subtype only ever holds exactly this shape.
    FixedShape(Vec<usize>),
}

impl SubtypeConstraint {
    /// Whether `shape` satisfies this constraint.
    pub fn accepts(&self, shape: &[usize]) -> bool {
        match self {
            SubtypeConstraint::Rank(n) => shape.len() == *n,
            SubtypeConstraint::FixedShape(s) => shape == s.as_slice(),
        }
    }

    /// Higher wins when more than one input imposes a constraint (spec.md
    /// §4.7's "output adopts the highest-priority subtype"): a fixed shape
    /// is a stricter variant than a bare rank constraint.
    fn priority(&self) -> u8 {
        match self {
            SubtypeConstraint::Rank(_) => 1,
            SubtypeConstraint::FixedShape(_) => 2,
        }
    }

    pub(crate) fn strictest(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if b.priority() > a.priority() { b } else { a }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}

/// A caller-supplied operand input position: either an existing array, or
/// "none" requesting an allocated output (spec.md §3, §4.7).
pub enum OperandInput<'a> {
    Array(&'a dyn RawArrayOperand),
    None,
}

/// One entry of the operand list passed to [`crate::NdIterBuilder`].
pub struct OperandSpec<'a> {
    pub input: OperandInput<'a>,
    pub flags: OperandFlags,
    /// `op_dtype`: cast/allocate this operand to a specific dtype.
    pub dtype: Option<Dtype>,
    /// `op_axes`: caller-supplied iteration-axis -> operand-axis mapping.
    pub op_axes: Option<Vec<AxisSel>>,
}

impl<'a> OperandSpec<'a> {
    pub fn readonly(array: &'a dyn RawArrayOperand) -> Self {
        OperandSpec {
            input: OperandInput::Array(array),
            flags: OperandFlags { readonly: true, ..Default::default() },
            dtype: None,
            op_axes: None,
        }
    }

    pub fn readwrite(array: &'a dyn RawArrayOperand) -> Self {
        OperandSpec {
            input: OperandInput::Array(array),
            flags: OperandFlags { readwrite: true, ..Default::default() },
            dtype: None,
            op_axes: None,
        }
    }

    pub fn writeonly(array: &'a dyn RawArrayOperand) -> Self {
        OperandSpec {
            input: OperandInput::Array(array),
            flags: OperandFlags { writeonly: true, ..Default::default() },
            dtype: None,
            op_axes: None,
        }
    }

    /// An allocated output: input position "none" with `allocate` set.
    pub fn allocate(dtype: Option<Dtype>) -> Self {
        OperandSpec {
            input: OperandInput::None,
            flags: OperandFlags { writeonly: true, allocate: true, ..Default::default() },
            dtype,
            op_axes: None,
        }
    }

    pub fn with_dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn with_op_axes(mut self, axes: Vec<AxisSel>) -> Self {
        self.op_axes = Some(axes);
        self
    }

    pub fn with_flags(mut self, flags: OperandFlags) -> Self {
        self.flags = flags;
        self
    }
}

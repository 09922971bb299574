// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Dtype descriptor and casting lattice (C1).
//!
//! Element types are represented explicitly (kind + width + byte order)
//! rather than dispatched through a per-element runtime type check: every
//! casting decision switches on this descriptor once, at construction time.

use std::cmp::Ordering;
use std::fmt;

/// The family of values a [`Dtype`] holds.
///
/// Ordered `Bool < UInt < Int < Float < Complex` for promotion purposes,
/// matching the "wider/shared kind wins; floating > integer; complex >
/// floating" rule from the specification's common-dtype resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKind {
    Bool,
    UInt,
    Int,
    Float,
    Complex,
}

/// Byte order of a dtype's in-memory representation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Native,
    Swapped,
}

impl ByteOrder {
    pub fn flipped(self) -> ByteOrder {
        match self {
            ByteOrder::Native => ByteOrder::Swapped,
            ByteOrder::Swapped => ByteOrder::Native,
        }
    }
}

/// An element-type descriptor: kind, width in bytes, and byte order.
///
/// Two dtypes are `==` only if kind, width, and byte order all agree. Use
/// [`Dtype::equiv`] to ignore byte order and [`Dtype::same_kind`] to ignore
/// width as well.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Dtype {
    pub kind: TypeKind,
    pub itemsize: usize,
    pub byteorder: ByteOrder,
}

impl fmt::Debug for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}{}", self.kind, self.itemsize * 8,
            if self.byteorder == ByteOrder::Swapped { "<swapped>" } else { "" })
    }
}

macro_rules! dtype_const {
    ($name:ident, $kind:expr, $size:expr) => {
        pub const $name: Dtype = Dtype { kind: $kind, itemsize: $size, byteorder: ByteOrder::Native };
    };
}

impl Dtype {
    dtype_const!(BOOL, TypeKind::Bool, 1);
    dtype_const!(I8, TypeKind::Int, 1);
    dtype_const!(I16, TypeKind::Int, 2);
    dtype_const!(I32, TypeKind::Int, 4);
    dtype_const!(I64, TypeKind::Int, 8);
    dtype_const!(U8, TypeKind::UInt, 1);
    dtype_const!(U16, TypeKind::UInt, 2);
    dtype_const!(U32, TypeKind::UInt, 4);
    dtype_const!(U64, TypeKind::UInt, 8);
    dtype_const!(F16, TypeKind::Float, 2);
    dtype_const!(F32, TypeKind::Float, 4);
    dtype_const!(F64, TypeKind::Float, 8);
    dtype_const!(C64, TypeKind::Complex, 8);
    dtype_const!(C128, TypeKind::Complex, 16);

    pub fn swapped(self) -> Dtype {
        Dtype { byteorder: self.byteorder.flipped(), ..self }
    }

    pub fn is_native(&self) -> bool {
        self.byteorder == ByteOrder::Native
    }

    /// Same kind and width, any byte order (the `equiv` casting level).
    pub fn equiv(&self, other: &Dtype) -> bool {
        self.kind == other.kind && self.itemsize == other.itemsize
    }

    /// Same kind family, any width or byte order (the `same_kind` level).
    pub fn same_kind(&self, other: &Dtype) -> bool {
        self.kind == other.kind
    }

    fn mantissa_bits(&self) -> u32 {
        match (self.kind, self.itemsize) {
            (TypeKind::Float, 2) => 11,
            (TypeKind::Float, 4) => 24,
            (TypeKind::Float, 8) => 53,
            (TypeKind::Complex, 8) => 24,
            (TypeKind::Complex, 16) => 53,
            _ => 0,
        }
    }
}

/// Safety levels for a dtype conversion, totally ordered from strictest to
/// loosest: `No < Equiv < Safe < SameKind < Unsafe`.
///
/// A cast is permitted iff its [`required_level`] is `<=` the iterator's
/// configured casting level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CastSafety {
    No,
    Equiv,
    Safe,
    SameKind,
    Unsafe,
}

impl fmt::Display for CastSafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CastSafety::No => "no",
            CastSafety::Equiv => "equiv",
            CastSafety::Safe => "safe",
            CastSafety::SameKind => "same_kind",
            CastSafety::Unsafe => "unsafe",
        };
        f.write_str(s)
    }
}

/// The minimal [`CastSafety`] level required to convert `from` into `to`.
///
/// Implements the rules from the specification's §4.4:
/// - identical dtype (including byte order): `No`.
/// - same kind and width, different byte order: `Equiv`.
/// - every value of `from` representable in `to`: `Safe`.
/// - different kind but the same family (e.g. `c16` -> `c8`) or a narrowing
///   within a family that `Safe` doesn't cover: `SameKind`.
/// - anything else: `Unsafe`.
pub fn required_level(from: Dtype, to: Dtype) -> CastSafety {
    if from == to {
        return CastSafety::No;
    }
    if from.equiv(&to) {
        return CastSafety::Equiv;
    }
    if is_safe_cast(from, to) {
        return CastSafety::Safe;
    }
    if from.same_kind(&to) || is_same_kind_cast(from, to) {
        return CastSafety::SameKind;
    }
    CastSafety::Unsafe
}

fn rank(kind: TypeKind) -> u32 {
    match kind {
        TypeKind::Bool => 0,
        TypeKind::UInt => 1,
        TypeKind::Int => 1,
        TypeKind::Float => 2,
        TypeKind::Complex => 3,
    }
}

fn is_safe_cast(from: Dtype, to: Dtype) -> bool {
    match (from.kind, to.kind) {
        (TypeKind::Bool, _) => true,
        (TypeKind::UInt, TypeKind::UInt) | (TypeKind::Int, TypeKind::Int) => to.itemsize >= from.itemsize,
        (TypeKind::UInt, TypeKind::Int) => to.itemsize > from.itemsize,
        (TypeKind::Int, TypeKind::UInt) => false,
        (TypeKind::UInt, TypeKind::Float) | (TypeKind::Int, TypeKind::Float) => {
            (to.itemsize * 8).saturating_sub(if to.itemsize == 2 { 5 } else if to.itemsize == 4 { 8 } else { 11 })
                >= from.itemsize * 8
        }
        (TypeKind::Float, TypeKind::Float) => to.mantissa_bits() >= from.mantissa_bits() && to.itemsize >= from.itemsize,
        (TypeKind::Float, TypeKind::Complex) | (TypeKind::UInt, TypeKind::Complex) | (TypeKind::Int, TypeKind::Complex) => {
            rank(from.kind) <= rank(to.kind) && to.itemsize / 2 >= from.itemsize.min(8)
        }
        (TypeKind::Complex, TypeKind::Complex) => to.itemsize >= from.itemsize,
        _ => false,
    }
}

fn is_same_kind_cast(from: Dtype, to: Dtype) -> bool {
    // Narrowing within a compatible numeric direction: float->float or
    // complex->complex of any width, or float->complex, is "same_kind" even
    // when not "safe" (loses precision but not category).
    matches!(
        (from.kind, to.kind),
        (TypeKind::Float, TypeKind::Float)
            | (TypeKind::Complex, TypeKind::Complex)
            | (TypeKind::Float, TypeKind::Complex)
            | (TypeKind::Int, TypeKind::Float)
            | (TypeKind::UInt, TypeKind::Float)
            | (TypeKind::Int, TypeKind::Complex)
            | (TypeKind::UInt, TypeKind::Complex)
    )
}

pub fn can_cast(from: Dtype, to: Dtype, allowed: CastSafety) -> bool {
    required_level(from, to) <= allowed
}

/// Promote a set of input dtypes to one common dtype, implementing the
/// lattice from §4.4: wider/shared kind wins, floating beats integer,
/// complex beats floating.
///
/// Open question (spec.md §9, carried forward intentionally, see
/// `DESIGN.md`): a mixed signed/unsigned integer pair of equal rank
/// promotes to the *unsigned* type, matching the reference implementation's
/// documented-but-unresolved behavior rather than "fixing" it to a wider
/// signed type.
pub fn common_dtype(dtypes: &[Dtype]) -> Dtype {
    assert!(!dtypes.is_empty(), "common_dtype requires at least one operand");
    let mut acc = dtypes[0];
    for &d in &dtypes[1..] {
        acc = promote_pair(acc, d);
    }
    Dtype { kind: acc.kind, itemsize: acc.itemsize, byteorder: ByteOrder::Native }
}

fn promote_pair(a: Dtype, b: Dtype) -> Dtype {
    if a.kind == b.kind {
        return Dtype { itemsize: a.itemsize.max(b.itemsize), ..a };
    }
    let (lo, hi) = if rank(a.kind) <= rank(b.kind) { (a, b) } else { (b, a) };
    match (lo.kind, hi.kind) {
        (TypeKind::Bool, _) => hi,
        (TypeKind::UInt, TypeKind::Int) | (TypeKind::Int, TypeKind::UInt) => {
            // Same-rank mixed signedness: promote to the wider of the two,
            // breaking itemsize ties in favor of unsigned (see doc comment).
            let size = a.itemsize.max(b.itemsize);
            let kind = if a.itemsize == b.itemsize {
                TypeKind::UInt
            } else if a.itemsize > b.itemsize {
                a.kind
            } else {
                b.kind
            };
            Dtype { kind, itemsize: size, byteorder: ByteOrder::Native }
        }
        (TypeKind::UInt, TypeKind::Float) | (TypeKind::Int, TypeKind::Float) => {
            Dtype { kind: TypeKind::Float, itemsize: hi.itemsize.max(default_float_width(lo.itemsize)), byteorder: ByteOrder::Native }
        }
        (TypeKind::Float, TypeKind::Complex) | (TypeKind::UInt, TypeKind::Complex) | (TypeKind::Int, TypeKind::Complex) => {
            Dtype { kind: TypeKind::Complex, itemsize: hi.itemsize.max(lo.itemsize * 2), byteorder: ByteOrder::Native }
        }
        _ => hi,
    }
}

fn default_float_width(int_width: usize) -> usize {
    match int_width {
        1 | 2 => 4,
        _ => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_no_cast() {
        assert_eq!(required_level(Dtype::F64, Dtype::F64), CastSafety::No);
    }

    #[test]
    fn byte_swap_only_is_equiv() {
        assert_eq!(required_level(Dtype::F32, Dtype::F32.swapped()), CastSafety::Equiv);
    }

    #[test]
    fn widening_float_is_safe() {
        assert_eq!(required_level(Dtype::F32, Dtype::F64), CastSafety::Safe);
        assert_eq!(required_level(Dtype::I32, Dtype::F64), CastSafety::Safe);
    }

    #[test]
    fn narrowing_float_is_same_kind() {
        assert_eq!(required_level(Dtype::F64, Dtype::F32), CastSafety::SameKind);
        assert_eq!(required_level(Dtype::C128, Dtype::C64), CastSafety::SameKind);
    }

    #[test]
    fn int_to_uint_is_unsafe() {
        assert_eq!(required_level(Dtype::I32, Dtype::U32), CastSafety::Unsafe);
    }

    #[test]
    fn common_dtype_promotes_float_over_int() {
        let d = common_dtype(&[Dtype::I32, Dtype::F32]);
        assert_eq!(d.kind, TypeKind::Float);
        assert_eq!(d.itemsize, 4);
    }

    #[test]
    fn common_dtype_promotes_complex_over_float() {
        let d = common_dtype(&[Dtype::F64, Dtype::C64]);
        assert_eq!(d.kind, TypeKind::Complex);
        assert!(d.itemsize >= 8);
    }

    #[test]
    fn common_dtype_mixed_signedness_same_rank_picks_unsigned() {
        let d = common_dtype(&[Dtype::I32, Dtype::U32]);
        assert_eq!(d.kind, TypeKind::UInt);
        assert_eq!(d.itemsize, 4);
    }

    #[test]
    fn can_cast_respects_level() {
        assert!(can_cast(Dtype::F64, Dtype::F32, CastSafety::SameKind));
        assert!(!can_cast(Dtype::F64, Dtype::F32, CastSafety::Safe));
    }
}

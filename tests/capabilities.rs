// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Supplemental coverage for the capability flags, scalar operands, and
//! ranged cursor access that the §8 scenarios don't exercise directly.

mod support;

use nditer::{CastSafety, Dtype, ErrorKind, NdIterBuilder, OperandSpec};
use support::{f64_array, read_f64, FakeArray, RankFixedArray};

#[test]
fn allocated_output_rejects_a_shape_the_input_subtype_cannot_hold() {
    // `a` is (2, 3) but its subtype only ever holds rank-3 arrays, so an
    // allocated output broadcast to (2, 3) can't satisfy it.
    let a = RankFixedArray { inner: f64_array(vec![2, 3], &[0.0; 6]), rank: 3 };
    let out = OperandSpec::allocate(Some(Dtype::F64));

    let err = NdIterBuilder::new(vec![OperandSpec::readonly(&a), out]).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SubtypeShapeConflict);
}

#[test]
fn no_subtype_opts_the_output_out_of_the_constraint() {
    let a = RankFixedArray { inner: f64_array(vec![2, 3], &[0.0; 6]), rank: 3 };
    let mut out = OperandSpec::allocate(Some(Dtype::F64));
    out.flags.no_subtype = true;

    let it = NdIterBuilder::new(vec![OperandSpec::readonly(&a), out]).build().unwrap();
    assert_eq!(it.shape(), &[2, 3]);
}

#[test]
fn conflicting_mode_flags_are_rejected_before_any_work() {
    let a = f64_array(vec![2], &[1.0, 2.0]);
    let mut spec = OperandSpec::readonly(&a);
    spec.flags.readwrite = true; // now both readonly and readwrite are set

    let err = NdIterBuilder::new(vec![spec]).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FlagConflict);
}

#[test]
fn write_against_a_non_writeable_backing_is_rejected() {
    let mut a = f64_array(vec![3], &[1.0, 2.0, 3.0]);
    a.writeable = false;

    let err = NdIterBuilder::new(vec![OperandSpec::readwrite(&a)]).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadOnlyOperand);
}

#[test]
fn writing_a_non_writeable_scalar_is_a_type_error() {
    let mut a = f64_array(vec![], &[7.0]);
    a.writeable = false;

    let err = NdIterBuilder::new(vec![OperandSpec::writeonly(&a)]).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

#[test]
fn a_zero_dim_operand_iterates_exactly_once() {
    let a = f64_array(vec![], &[42.0]);
    let mut it = NdIterBuilder::new(vec![OperandSpec::readonly(&a)]).no_inner_iteration().build().unwrap();
    assert_eq!(it.itersize(), 1);
    assert_eq!(unsafe { read_f64(it.current_ptr(0)) }, 42.0);
    assert!(!it.advance());
    assert!(it.finished());
}

#[test]
fn removing_coords_drops_the_capability() {
    let a = f64_array(vec![2], &[1.0, 2.0]);
    let mut it = NdIterBuilder::new(vec![OperandSpec::readonly(&a)]).no_inner_iteration().coords().build().unwrap();
    assert!(it.coords().is_ok());
    it.remove_coords();
    assert_eq!(it.coords().unwrap_err().kind(), ErrorKind::CapabilityMissing);
}

#[test]
fn iterrange_restricts_traversal_to_a_sub_range() {
    let a = f64_array(vec![4], &[1.0, 2.0, 3.0, 4.0]);
    let mut it = NdIterBuilder::new(vec![OperandSpec::readonly(&a)])
        .no_inner_iteration()
        .ranged()
        .build()
        .unwrap();
    it.set_iterrange(1, 3).unwrap();
    assert_eq!(it.iterrange().unwrap(), (1, 3));

    let mut seen = Vec::new();
    loop {
        seen.push(unsafe { read_f64(it.current_ptr(0)) });
        if !it.advance() {
            break;
        }
    }
    assert_eq!(seen, vec![2.0, 3.0]);
}

#[test]
fn iterrange_requires_the_ranged_capability() {
    let a = f64_array(vec![4], &[1.0, 2.0, 3.0, 4.0]);
    let mut it = NdIterBuilder::new(vec![OperandSpec::readonly(&a)]).no_inner_iteration().build().unwrap();
    assert_eq!(it.set_iterrange(0, 2).unwrap_err().kind(), ErrorKind::CapabilityMissing);
}

#[test]
fn same_kind_cast_is_rejected_at_the_safe_level() {
    // f64 -> i32 is a narrowing cast that needs `same_kind`, not `safe`.
    let a = f64_array(vec![2], &[1.5, 2.5]);
    let mut spec = OperandSpec::readonly(&a);
    spec.dtype = Some(Dtype::I32);

    let err = NdIterBuilder::new(vec![spec]).casting(CastSafety::Safe).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CastNotPermitted);
}

#[test]
fn same_kind_cast_succeeds_once_permitted() {
    let a = FakeArray {
        shape: vec![2],
        strides: vec![1],
        dtype: Dtype::I32,
        data: std::cell::RefCell::new({
            let mut data = vec![0u8; 8];
            data[0..4].copy_from_slice(&10i32.to_ne_bytes());
            data[4..8].copy_from_slice(&20i32.to_ne_bytes());
            data
        }),
        base_offset: 0,
        writeable: true,
    };
    let mut spec = OperandSpec::readonly(&a);
    spec.dtype = Some(Dtype::F32);
    spec.flags.copy = true;

    let mut it =
        NdIterBuilder::new(vec![spec]).casting(CastSafety::SameKind).no_inner_iteration().build().unwrap();
    let mut seen = Vec::new();
    loop {
        seen.push(unsafe { *(it.current_ptr(0) as *const f32) });
        if !it.advance() {
            break;
        }
    }
    assert_eq!(seen, vec![10.0, 20.0]);
}

#[test]
fn dropping_without_an_explicit_finalize_still_writes_back_updateifcopy() {
    let a = f64_array(vec![2], &[1.0, 2.0]);
    {
        let mut spec = OperandSpec::readwrite(&a);
        spec.flags.updateifcopy = true;
        spec.dtype = Some(Dtype::F32);

        let mut it =
            NdIterBuilder::new(vec![spec]).casting(CastSafety::SameKind).no_inner_iteration().build().unwrap();
        loop {
            let ptr = it.current_ptr(0) as *mut f32;
            unsafe { *ptr = *ptr * 10.0 };
            if !it.advance() {
                break;
            }
        }
        // `it` is dropped here without calling `finalize()`.
    }

    let data = a.data.borrow();
    let read_at = |i: usize| unsafe { read_f64(data.as_ptr().add(i * 8)) };
    assert_eq!(read_at(0), 10.0);
    assert_eq!(read_at(1), 20.0);
}

#[test]
fn common_dtype_promotes_mixed_inputs_before_iterating() {
    let ints = {
        let shape = vec![2];
        let mut data = vec![0u8; 8];
        data[0..4].copy_from_slice(&1i32.to_ne_bytes());
        data[4..8].copy_from_slice(&2i32.to_ne_bytes());
        FakeArray { shape, strides: vec![1], dtype: Dtype::I32, data: std::cell::RefCell::new(data), base_offset: 0, writeable: true }
    };
    let floats = f64_array(vec![2], &[10.5, 20.5]);
    let mut int_spec = OperandSpec::readonly(&ints);
    int_spec.flags.copy = true;

    let mut it = NdIterBuilder::new(vec![int_spec, OperandSpec::readonly(&floats)])
        .common_dtype()
        .casting(CastSafety::Safe)
        .no_inner_iteration()
        .build()
        .unwrap();
    assert_eq!(it.operand_dtype(0), Dtype::F64);
    assert_eq!(it.operand_dtype(1), Dtype::F64);

    let mut sums = Vec::new();
    loop {
        let a = unsafe { read_f64(it.current_ptr(0)) };
        let b = unsafe { read_f64(it.current_ptr(1)) };
        sums.push(a + b);
        if !it.advance() {
            break;
        }
    }
    assert_eq!(sums, vec![11.5, 22.5]);
}

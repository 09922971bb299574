// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Element-level cast/byte-swap kernel backing C1's casting lattice and
//! C5's buffered refill/flush.
//!
//! Every conversion routes through an `Complex<f64>` intermediate: wide
//! enough to round-trip any dtype this crate defines losslessly in the
//! `safe` direction, and simple enough that the cast table stays a single
//! function instead of an `N*N` match.

use num_complex::Complex64;

use crate::dtype::{ByteOrder, Dtype, TypeKind};

fn swap_bytes(buf: &mut [u8]) {
    buf.reverse();
}

unsafe fn read_raw(ptr: *const u8, dtype: Dtype) -> Complex64 {
    macro_rules! read_num {
        ($ty:ty) => {{
            let mut bytes = [0u8; std::mem::size_of::<$ty>()];
            std::ptr::copy_nonoverlapping(ptr, bytes.as_mut_ptr(), bytes.len());
            if dtype.byteorder == ByteOrder::Swapped {
                swap_bytes(&mut bytes);
            }
            <$ty>::from_ne_bytes(bytes)
        }};
    }
    match (dtype.kind, dtype.itemsize) {
        (TypeKind::Bool, _) => Complex64::new(if *ptr != 0 { 1.0 } else { 0.0 }, 0.0),
        (TypeKind::Int, 1) => Complex64::new(read_num!(i8) as f64, 0.0),
        (TypeKind::Int, 2) => Complex64::new(read_num!(i16) as f64, 0.0),
        (TypeKind::Int, 4) => Complex64::new(read_num!(i32) as f64, 0.0),
        (TypeKind::Int, 8) => Complex64::new(read_num!(i64) as f64, 0.0),
        (TypeKind::UInt, 1) => Complex64::new(read_num!(u8) as f64, 0.0),
        (TypeKind::UInt, 2) => Complex64::new(read_num!(u16) as f64, 0.0),
        (TypeKind::UInt, 4) => Complex64::new(read_num!(u32) as f64, 0.0),
        (TypeKind::UInt, 8) => Complex64::new(read_num!(u64) as f64, 0.0),
        (TypeKind::Float, 4) => Complex64::new(read_num!(f32) as f64, 0.0),
        (TypeKind::Float, 8) => Complex64::new(read_num!(f64), 0.0),
        (TypeKind::Complex, 8) => {
            let re = {
                let mut b = [0u8; 4];
                std::ptr::copy_nonoverlapping(ptr, b.as_mut_ptr(), 4);
                if dtype.byteorder == ByteOrder::Swapped { swap_bytes(&mut b); }
                f32::from_ne_bytes(b)
            };
            let im = {
                let mut b = [0u8; 4];
                std::ptr::copy_nonoverlapping(ptr.add(4), b.as_mut_ptr(), 4);
                if dtype.byteorder == ByteOrder::Swapped { swap_bytes(&mut b); }
                f32::from_ne_bytes(b)
            };
            Complex64::new(re as f64, im as f64)
        }
        (TypeKind::Complex, 16) => {
            let re = {
                let mut b = [0u8; 8];
                std::ptr::copy_nonoverlapping(ptr, b.as_mut_ptr(), 8);
                if dtype.byteorder == ByteOrder::Swapped { swap_bytes(&mut b); }
                f64::from_ne_bytes(b)
            };
            let im = {
                let mut b = [0u8; 8];
                std::ptr::copy_nonoverlapping(ptr.add(8), b.as_mut_ptr(), 8);
                if dtype.byteorder == ByteOrder::Swapped { swap_bytes(&mut b); }
                f64::from_ne_bytes(b)
            };
            Complex64::new(re, im)
        }
        _ => panic!("unsupported dtype in cast kernel: {:?}", dtype),
    }
}

unsafe fn write_raw(ptr: *mut u8, dtype: Dtype, value: Complex64) {
    macro_rules! write_num {
        ($ty:ty, $v:expr) => {{
            let mut bytes = ($v as $ty).to_ne_bytes();
            if dtype.byteorder == ByteOrder::Swapped {
                swap_bytes(&mut bytes);
            }
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        }};
    }
    match (dtype.kind, dtype.itemsize) {
        (TypeKind::Bool, _) => *ptr = if value.re != 0.0 { 1 } else { 0 },
        (TypeKind::Int, 1) => write_num!(i8, value.re),
        (TypeKind::Int, 2) => write_num!(i16, value.re),
        (TypeKind::Int, 4) => write_num!(i32, value.re),
        (TypeKind::Int, 8) => write_num!(i64, value.re),
        (TypeKind::UInt, 1) => write_num!(u8, value.re),
        (TypeKind::UInt, 2) => write_num!(u16, value.re),
        (TypeKind::UInt, 4) => write_num!(u32, value.re),
        (TypeKind::UInt, 8) => write_num!(u64, value.re),
        (TypeKind::Float, 4) => write_num!(f32, value.re),
        (TypeKind::Float, 8) => write_num!(f64, value.re),
        (TypeKind::Complex, 8) => {
            let mut re = (value.re as f32).to_ne_bytes();
            let mut im = (value.im as f32).to_ne_bytes();
            if dtype.byteorder == ByteOrder::Swapped {
                swap_bytes(&mut re);
                swap_bytes(&mut im);
            }
            std::ptr::copy_nonoverlapping(re.as_ptr(), ptr, 4);
            std::ptr::copy_nonoverlapping(im.as_ptr(), ptr.add(4), 4);
        }
        (TypeKind::Complex, 16) => {
            let mut re = value.re.to_ne_bytes();
            let mut im = value.im.to_ne_bytes();
            if dtype.byteorder == ByteOrder::Swapped {
                swap_bytes(&mut re);
                swap_bytes(&mut im);
            }
            std::ptr::copy_nonoverlapping(re.as_ptr(), ptr, 8);
            std::ptr::copy_nonoverlapping(im.as_ptr(), ptr.add(8), 8);
        }
        _ => panic!("unsupported dtype in cast kernel: {:?}", dtype),
    }
}

/// Cast (and/or byte-swap) a single element from `src` (typed `src_dtype`)
/// into `dst` (typed `dst_dtype`).
///
/// # Safety
///
/// `src` must be readable for `src_dtype.itemsize` bytes and `dst` writeable
/// for `dst_dtype.itemsize` bytes.
pub unsafe fn cast_element(src: *const u8, src_dtype: Dtype, dst: *mut u8, dst_dtype: Dtype) {
    if src_dtype == dst_dtype {
        std::ptr::copy_nonoverlapping(src, dst, src_dtype.itemsize);
        return;
    }
    let v = read_raw(src, src_dtype);
    write_raw(dst, dst_dtype, v);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Dtype;

    fn cast_roundtrip(from: Dtype, to: Dtype, value: f64) -> f64 {
        let mut src_buf = vec![0u8; from.itemsize];
        unsafe { write_raw(src_buf.as_mut_ptr(), from, Complex64::new(value, 0.0)) };
        let mut dst_buf = vec![0u8; to.itemsize];
        unsafe { cast_element(src_buf.as_ptr(), from, dst_buf.as_mut_ptr(), to) };
        unsafe { read_raw(dst_buf.as_ptr(), to).re }
    }

    #[test]
    fn f32_to_f64_widens_exactly() {
        assert_eq!(cast_roundtrip(Dtype::F32, Dtype::F64, 2.5), 2.5);
    }

    #[test]
    fn i32_to_f64_exact_for_small_ints() {
        assert_eq!(cast_roundtrip(Dtype::I32, Dtype::F64, 42.0), 42.0);
    }

    #[test]
    fn byte_swap_round_trips_identity() {
        let native = Dtype::F32;
        let swapped = native.swapped();
        let mut src_buf = vec![0u8; 4];
        unsafe { write_raw(src_buf.as_mut_ptr(), native, Complex64::new(3.25, 0.0)) };
        let mut mid = vec![0u8; 4];
        unsafe { cast_element(src_buf.as_ptr(), native, mid.as_mut_ptr(), swapped) };
        let mut back = vec![0u8; 4];
        unsafe { cast_element(mid.as_ptr(), swapped, back.as_mut_ptr(), native) };
        assert_eq!(src_buf, back);
    }
}

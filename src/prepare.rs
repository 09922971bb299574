// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Operand preparer (C4): ties dtype resolution (C1), broadcasting (C2)
//! and axis planning (C3) together, materializes casting/alignment copies,
//! and allocates implicit output operands.

use crate::broadcast::{apply_op_axes, broadcast_shapes, broadcast_strides, check_no_broadcast, validate_op_axes};
use crate::buffer::OperandBuffer;
use crate::cast::cast_element;
use crate::dtype::{common_dtype, required_level, ByteOrder, CastSafety, Dtype};
use crate::error::{ErrorKind, IterError, IterResult};
use crate::flags::{AccessMode, GlobalFlags, Order};
use crate::operand::{OperandInput, OperandSpec, SubtypeConstraint};
use crate::operand::RawArrayOperand as _;
use crate::owned::{c_strides, strides_for_order, OwnedBuffer};
use crate::planner::{coalesce, plan_axes, plan_axes_grouped, AxisPlan, CoalesceGroups};

/// A pointer+stride+dtype view onto memory, in iteration-axis order
/// (outermost axis first, after planning/reversal but *before* coalescing
/// is folded into [`PreparedIteration::shape`]).
#[derive(Clone)]
pub(crate) struct Backing {
    pub ptr: *mut u8,
    pub strides: Vec<isize>,
    pub dtype: Dtype,
}

impl Backing {
    /// Pointer to the element at iteration coordinates `coords`.
    pub(crate) unsafe fn ptr_at(&self, coords: &[usize]) -> *mut u8 {
        let mut offset: isize = 0;
        for (c, s) in coords.iter().zip(self.strides.iter()) {
            offset += *c as isize * s;
        }
        self.ptr.offset(offset * self.dtype.itemsize as isize)
    }
}

/// The commitment to cast a working copy back into the original backing on
/// release (`updateifcopy`).
pub(crate) struct Writeback {
    pub dest: Backing,
}

/// A single operand after C1–C4 have run: immutable for the rest of the
/// iterator's life (spec.md §3).
pub(crate) struct PreparedOperand {
    pub mode: AccessMode,
    pub backing: Backing,
    pub writeback: Option<Writeback>,
    pub buffer: Option<OperandBuffer>,
    /// Keeps a materialized copy's allocation alive; `None` when `backing`
    /// points directly into caller-owned storage.
    pub owned: Option<OwnedBuffer>,
    /// True if, per axis (iteration-position order, pre-coalesce), this
    /// operand's stride is 0 (a broadcast axis) — used by the buffer
    /// engine's `BufferWriteMerge` check.
    pub broadcast_axis: Vec<bool>,
}

pub(crate) struct PreparedIteration {
    /// Iteration shape after coalescing.
    pub shape: Vec<usize>,
    /// Iteration shape before coalescing (one entry per planned axis).
    pub pre_coalesce_shape: Vec<usize>,
    pub operands: Vec<PreparedOperand>,
    pub coalesce_groups: CoalesceGroups,
    /// Natural (pre-planning) broadcast shape, used for c_index/f_index.
    pub natural_shape: Vec<usize>,
    pub plan: AxisPlan,
}

fn right_align(shape: &[usize], strides: &[isize], ndim: usize) -> (Vec<usize>, Vec<isize>) {
    let offset = ndim - shape.len();
    let mut s = vec![1usize; ndim];
    let mut st = vec![0isize; ndim];
    for i in 0..shape.len() {
        s[offset + i] = shape[i];
        st[offset + i] = strides[i];
    }
    (s, st)
}

fn apply_reversal(shape: &[usize], strides: &[isize], reverse: &[bool]) -> (Vec<isize>, isize) {
    let mut out = vec![0isize; strides.len()];
    let mut offset: isize = 0;
    for i in 0..strides.len() {
        if reverse[i] {
            out[i] = -strides[i];
            if shape[i] > 0 {
                offset += (shape[i] as isize - 1) * strides[i];
            }
        } else {
            out[i] = strides[i];
        }
    }
    (out, offset)
}

fn permute(values: &[isize], perm: &[usize]) -> Vec<isize> {
    perm.iter().map(|&a| values[a]).collect()
}

fn permute_usize(values: &[usize], perm: &[usize]) -> Vec<usize> {
    perm.iter().map(|&a| values[a]).collect()
}

struct ArrayOperandInfo<'a> {
    array: &'a dyn crate::operand::RawArrayOperand,
    aligned_shape: Vec<usize>,
    aligned_strides: Vec<isize>,
}

pub(crate) fn prepare<'a>(
    specs: &[OperandSpec<'a>],
    global: &GlobalFlags,
    order: Order,
    casting: CastSafety,
    buffersize: usize,
) -> IterResult<PreparedIteration> {
    prepare_inner(specs, global, order, casting, buffersize, None)
}

/// As [`prepare`], but with the iteration axes partitioned into ordered
/// groups (spec.md §4.6) that must stay contiguous and in group order
/// through C3: `order = K` may flip/reorder axes *within* each group, any
/// other order preserves each group's caller-given axis order verbatim.
/// Used by [`crate::nested::nested_iters`].
pub(crate) fn prepare_with_groups<'a>(
    specs: &[OperandSpec<'a>],
    global: &GlobalFlags,
    order: Order,
    casting: CastSafety,
    groups: &[Vec<usize>],
) -> IterResult<PreparedIteration> {
    prepare_inner(specs, global, order, casting, 1, Some(groups))
}

fn prepare_inner<'a>(
    specs: &[OperandSpec<'a>],
    global: &GlobalFlags,
    order: Order,
    casting: CastSafety,
    buffersize: usize,
    groups: Option<&[Vec<usize>]>,
) -> IterResult<PreparedIteration> {
    global.validate()?;

    // --- ndim resolution ---
    let mut ndim = None;
    for spec in specs {
        if let Some(axes) = &spec.op_axes {
            match ndim {
                None => ndim = Some(axes.len()),
                Some(n) if n != axes.len() => {
                    return Err(IterError::new(ErrorKind::AxisMapInvalid, "op_axes lengths disagree across operands"))
                }
                _ => {}
            }
        }
    }
    if ndim.is_none() {
        for spec in specs {
            if let OperandInput::Array(a) = &spec.input {
                ndim = Some(ndim.map_or(a.ndim(), |n: usize| n.max(a.ndim())));
            }
        }
    }
    let ndim = ndim.ok_or_else(|| IterError::new(ErrorKind::ShapeMismatch, "no operand provides a shape"))?;

    // --- axis-group validation (spec.md §4.6): every iteration axis must
    // appear in exactly one group ---
    if let Some(groups) = groups {
        let mut seen = vec![false; ndim];
        for group in groups {
            for &axis in group {
                if axis >= ndim || seen[axis] {
                    return Err(IterError::new(
                        ErrorKind::AxisMapInvalid,
                        "axis groups must partition every iteration axis exactly once",
                    ));
                }
                seen[axis] = true;
            }
        }
        if !seen.iter().all(|&s| s) {
            return Err(IterError::new(
                ErrorKind::AxisMapInvalid,
                "axis groups must partition every iteration axis exactly once",
            ));
        }
    }

    // --- per-operand alignment to broadcast-axis order ---
    let mut array_info: Vec<Option<ArrayOperandInfo>> = Vec::with_capacity(specs.len());
    let mut all_shapes: Vec<Vec<usize>> = Vec::new();
    for spec in specs {
        match &spec.input {
            OperandInput::Array(array) => {
                let (shape, strides) = if let Some(map) = &spec.op_axes {
                    validate_op_axes(map, array.ndim())?;
                    apply_op_axes(map, array.shape(), array.strides())
                } else {
                    right_align(array.shape(), array.strides(), ndim)
                };
                all_shapes.push(shape.clone());
                array_info.push(Some(ArrayOperandInfo { array: *array, aligned_shape: shape, aligned_strides: strides }));
            }
            OperandInput::None => array_info.push(None),
        }
    }
    if all_shapes.is_empty() {
        return Err(IterError::new(ErrorKind::ShapeMismatch, "at least one non-allocated operand is required"));
    }
    let shape_refs: Vec<&[usize]> = all_shapes.iter().map(|s| s.as_slice()).collect();
    let natural_shape = broadcast_shapes(&shape_refs)?;
    if natural_shape.iter().any(|&e| e == 0) {
        return Err(IterError::of(ErrorKind::EmptyIteration));
    }

    // --- subtype-shape check (spec.md §4.7): an allocated output adopts
    // the highest-priority subtype constraint among the real input
    // operands, and construction fails if the iteration shape can't
    // satisfy it, unless that output opted out with `no_subtype`. ---
    for (i, spec) in specs.iter().enumerate() {
        if array_info[i].is_some() || !spec.flags.allocate || spec.flags.no_subtype {
            continue;
        }
        let constraint = array_info
            .iter()
            .flatten()
            .fold(None, |acc, info| SubtypeConstraint::strictest(acc, info.array.subtype_constraint()));
        if let Some(constraint) = constraint {
            if !constraint.accepts(&natural_shape) {
                return Err(IterError::of(ErrorKind::SubtypeShapeConflict));
            }
        }
    }

    // --- per-operand natural (broadcast) strides + no_broadcast check ---
    let mut natural_strides: Vec<Option<Vec<isize>>> = Vec::with_capacity(specs.len());
    for (spec, info) in specs.iter().zip(array_info.iter()) {
        if let Some(info) = info {
            if spec.flags.no_broadcast {
                check_no_broadcast(&info.aligned_shape, &natural_shape)?;
            }
            natural_strides.push(Some(broadcast_strides(&natural_shape, &info.aligned_shape, &info.aligned_strides)));
        } else {
            natural_strides.push(None);
        }
    }

    // --- dtype resolution (C1) ---
    let input_native_dtypes: Vec<Dtype> = specs
        .iter()
        .zip(array_info.iter())
        .filter(|(spec, info)| info.is_some() && !spec.flags.allocate)
        .map(|(_, info)| info.as_ref().unwrap().array.dtype())
        .collect();
    let promoted_inputs = if input_native_dtypes.is_empty() {
        None
    } else {
        Some(common_dtype(&input_native_dtypes))
    };

    let mut effective_dtype = Vec::with_capacity(specs.len());
    for (spec, info) in specs.iter().zip(array_info.iter()) {
        let dt = if let Some(dt) = spec.dtype {
            dt
        } else if global.common_dtype {
            promoted_inputs.unwrap_or_else(|| info.as_ref().unwrap().array.dtype())
        } else if spec.flags.allocate {
            let dt = promoted_inputs.ok_or_else(|| {
                IterError::new(ErrorKind::CastNotPermitted, "allocated output needs at least one input dtype to infer from")
            })?;
            if input_native_dtypes.len() == 1 {
                Dtype { byteorder: input_native_dtypes[0].byteorder, ..dt }
            } else {
                Dtype { byteorder: ByteOrder::Native, ..dt }
            }
        } else {
            info.as_ref().unwrap().array.dtype()
        };
        effective_dtype.push(dt);
    }

    // --- access mode + cast permission per operand ---
    let mut modes = Vec::with_capacity(specs.len());
    for (spec, info) in specs.iter().zip(array_info.iter()) {
        let (backing_writeable, is_scalar) = match info {
            Some(info) => (info.array.writeable(), info.array.is_scalar()),
            None => (true, false),
        };
        modes.push(spec.flags.resolve_mode(backing_writeable, is_scalar)?);
    }

    let mut needs_fixup = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        let needs = match &array_info[i] {
            None => false,
            Some(info) => {
                let native = info.array.dtype();
                let dtype_changes = native != effective_dtype[i];
                let byteorder_fix = native.byteorder == ByteOrder::Swapped && effective_dtype[i].byteorder == ByteOrder::Native;
                let alignment_fix = !info.array.is_aligned();
                if dtype_changes {
                    let allowed = [
                        casting,
                        if spec.flags.same_kind_casts { CastSafety::SameKind } else { CastSafety::No },
                        if spec.flags.unsafe_casts { CastSafety::Unsafe } else { CastSafety::No },
                    ]
                    .into_iter()
                    .max()
                    .unwrap();
                    let needed = required_level(native, effective_dtype[i]);
                    if needed > allowed {
                        return Err(IterError::new(
                            ErrorKind::CastNotPermitted,
                            format!("{:?} -> {:?} requires {} casting", native, effective_dtype[i], needed),
                        ));
                    }
                    if !(spec.flags.copy || spec.flags.updateifcopy || spec.flags.allocate) {
                        return Err(IterError::new(ErrorKind::CastNotPermitted, "cast needs copy, updateifcopy, or allocate"));
                    }
                    true
                } else if byteorder_fix || alignment_fix {
                    if !spec.flags.nbo_aligned {
                        return Err(IterError::of(ErrorKind::AlignmentRequired));
                    }
                    true
                } else {
                    false
                }
            }
        };
        needs_fixup.push(needs);
    }

    // --- axis planning (C3): driven by the real operands' natural strides ---
    let real_strides: Vec<&[isize]> = natural_strides.iter().filter_map(|s| s.as_deref()).collect();
    let plan = match groups {
        Some(groups) => plan_axes_grouped(order, &natural_shape, &real_strides, groups),
        None => plan_axes(order, &natural_shape, &real_strides),
    };
    let permuted_shape = permute_usize(&natural_shape, &plan.perm);

    // Group boundaries (spec.md §4.6): the planned perm lays out each
    // group's axes as a contiguous block in group order regardless of any
    // K-order internal reshuffling, so the boundary between group `g` and
    // `g+1` always falls at the cumulative axis count — a plan *position*,
    // not a natural axis index.
    let group_boundaries: Vec<usize> = match groups {
        Some(groups) if groups.len() > 1 => {
            let mut bounds = Vec::with_capacity(groups.len() - 1);
            let mut acc = 0usize;
            for g in &groups[..groups.len() - 1] {
                acc += g.len();
                bounds.push(acc - 1);
            }
            bounds
        }
        _ => Vec::new(),
    };

    // --- place every operand in iteration-position order ---
    let mut operands = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        let mode = modes[i];
        let eff_dtype = effective_dtype[i];
        let buffered = global.buffered;

        let real_placed: Option<(Vec<isize>, isize, Dtype)> = natural_strides[i].as_ref().map(|ns| {
            let (reversed, offset) = apply_reversal(&natural_shape, ns, &plan.reverse);
            let iter_strides = permute(&reversed, &plan.perm);
            (iter_strides, offset, array_info[i].as_ref().unwrap().array.dtype())
        });

        let broadcast_axis: Vec<bool> = if let Some(ns) = &natural_strides[i] {
            let (reversed, _) = apply_reversal(&natural_shape, ns, &plan.reverse);
            let permuted = permute(&reversed, &plan.perm);
            permuted.iter().map(|&s| s == 0).collect()
        } else {
            vec![false; ndim]
        };

        if needs_fixup[i] && buffered {
            // Buffered: the scratch chunk IS the working copy; the buffer
            // engine casts during refill/flush. `backing` stays pointed at
            // the real array in its native dtype.
            let (iter_strides, offset, native_dtype) = real_placed.unwrap();
            let array = array_info[i].as_ref().unwrap().array;
            let base = unsafe { array.as_mut_ptr().offset(offset * native_dtype.itemsize as isize) };
            let backing = Backing { ptr: base, strides: iter_strides, dtype: native_dtype };
            let buffer = OperandBuffer::new(eff_dtype, buffersize.max(1), mode);
            operands.push(PreparedOperand { mode, backing, writeback: None, buffer: Some(buffer), owned: None, broadcast_axis });
            continue;
        }

        if needs_fixup[i] {
            // Non-buffered: eagerly materialize a full working copy.
            let (iter_strides, offset, native_dtype) = real_placed.unwrap();
            let array = array_info[i].as_ref().unwrap().array;
            let src_base = unsafe { array.as_mut_ptr().offset(offset * native_dtype.itemsize as isize) };
            let src_backing = Backing { ptr: src_base, strides: iter_strides.clone(), dtype: native_dtype };

            let natural_out_strides = strides_for_order(&natural_shape, &plan.perm);
            let copy = OwnedBuffer::zeros(&natural_shape, eff_dtype);
            let copy_iter_strides = permute(&natural_out_strides, &plan.perm);
            let copy_backing = Backing { ptr: copy.as_mut_ptr(), strides: copy_iter_strides, dtype: eff_dtype };

            if mode.may_read() {
                unsafe { transfer(&src_backing, &copy_backing, &permuted_shape) };
            }

            let writeback = if spec.flags.updateifcopy {
                Some(Writeback { dest: src_backing })
            } else {
                None
            };

            operands.push(PreparedOperand {
                mode,
                backing: copy_backing,
                writeback,
                buffer: None,
                owned: Some(copy),
                broadcast_axis,
            });
            continue;
        }

        match &array_info[i] {
            Some(_) => {
                let (iter_strides, offset, native_dtype) = real_placed.unwrap();
                let array = array_info[i].as_ref().unwrap().array;
                let base = unsafe { array.as_mut_ptr().offset(offset * native_dtype.itemsize as isize) };
                let backing = Backing { ptr: base, strides: iter_strides, dtype: native_dtype };
                operands.push(PreparedOperand { mode, backing, writeback: None, buffer: None, owned: None, broadcast_axis });
            }
            None => {
                // Allocated output (spec.md §4.7): memory layout matches
                // the planned iteration order.
                let natural_out_strides = strides_for_order(&natural_shape, &plan.perm);
                let out = OwnedBuffer::zeros(&natural_shape, eff_dtype);
                let iter_strides = permute(&natural_out_strides, &plan.perm);
                let backing = Backing { ptr: out.as_mut_ptr(), strides: iter_strides, dtype: eff_dtype };
                let buffer = if buffered { Some(OperandBuffer::new(eff_dtype, buffersize.max(1), mode)) } else { None };
                operands.push(PreparedOperand { mode, backing, writeback: None, buffer, owned: Some(out), broadcast_axis });
            }
        }
    }

    let pre_coalesce_shape = permuted_shape;

    // --- coalescing (C3): locked where coords/c_index/f_index would be
    // broken by merging (see DESIGN.md for the conservative rule used) ---
    // A writeback destination rides along as an extra stride set so its
    // axes only merge where the merge is *also* compatible with the real
    // backing it will be cast back into.
    let locked = lock_axes(&plan, global, &group_boundaries);
    let mut combined_strides: Vec<Vec<isize>> = operands.iter().map(|o| o.backing.strides.clone()).collect();
    let writeback_indices: Vec<usize> = operands
        .iter()
        .enumerate()
        .filter_map(|(i, o)| o.writeback.as_ref().map(|_| i))
        .collect();
    for &i in &writeback_indices {
        combined_strides.push(operands[i].writeback.as_ref().unwrap().dest.strides.clone());
    }

    let (coalesced_shape, coalesced_strides, groups) = if operands.iter().any(|o| o.buffer.is_some()) {
        // Buffered operands still advance per logical element internally;
        // coalescing their *exposed* geometry is handled by the cursor via
        // `pre_coalesce_shape`, so skip coalescing entirely when buffering
        // is active to keep chunk bookkeeping exact (see buffer.rs).
        let groups = pre_coalesce_shape.iter().enumerate().map(|(i, _)| vec![i]).collect();
        (pre_coalesce_shape.clone(), combined_strides.clone(), groups)
    } else {
        coalesce(&pre_coalesce_shape, &combined_strides, &locked)
    };

    let operand_count = operands.len();
    for (i, strides) in coalesced_strides.iter().take(operand_count).enumerate() {
        operands[i].backing.strides = strides.clone();
    }
    for (k, &i) in writeback_indices.iter().enumerate() {
        operands[i].writeback.as_mut().unwrap().dest.strides = coalesced_strides[operand_count + k].clone();
    }

    Ok(PreparedIteration {
        shape: coalesced_shape,
        pre_coalesce_shape,
        operands,
        coalesce_groups: groups,
        natural_shape,
        plan,
    })
}

/// `group_boundaries` are plan *positions* (not natural axis indices) after
/// which a group ends — the boundary between position `k` and `k+1` is
/// never coalesced.
fn lock_axes(plan: &AxisPlan, global: &GlobalFlags, group_boundaries: &[usize]) -> Vec<bool> {
    let ndim = plan.perm.len();
    if !group_boundaries.is_empty() {
        let mut locked = vec![false; ndim];
        for &pos in group_boundaries {
            if pos < ndim {
                locked[pos] = true;
            }
            if pos + 1 < ndim {
                locked[pos + 1] = true;
            }
        }
        return locked;
    }
    if global.coords {
        return vec![true; ndim];
    }
    if global.c_index && !plan.is_row_major_unflipped() {
        return vec![true; ndim];
    }
    if global.f_index && !plan.is_col_major_unflipped() {
        return vec![true; ndim];
    }
    vec![false; ndim]
}

/// Element-wise cast copy from `src` to `dst`, both in iteration-position
/// order over `shape` (`shape[k]` is the extent that `src.strides[k]` and
/// `dst.strides[k]` step over).
unsafe fn transfer(src: &Backing, dst: &Backing, shape: &[usize]) {
    let ndim = src.strides.len();
    if ndim == 0 {
        cast_element(src.ptr, src.dtype, dst.ptr, dst.dtype);
        return;
    }
    let extents: Vec<usize> = shape.to_vec();
    let total: usize = extents.iter().product();
    let mut counters = vec![0usize; ndim];
    for _ in 0..total {
        let mut soff: isize = 0;
        let mut doff: isize = 0;
        for k in 0..ndim {
            soff += counters[k] as isize * src.strides[k];
            doff += counters[k] as isize * dst.strides[k];
        }
        cast_element(
            src.ptr.offset(soff * src.dtype.itemsize as isize),
            src.dtype,
            dst.ptr.offset(doff * dst.dtype.itemsize as isize),
            dst.dtype,
        );
        for k in (0..ndim).rev() {
            counters[k] += 1;
            if counters[k] < extents[k].max(1) {
                break;
            }
            counters[k] = 0;
        }
    }
}

/// Cast-back a working copy into its original backing (`updateifcopy`'s
/// release-time obligation, spec.md §3 invariant 7 / §4.5's finalize step).
/// `shape` must be the iteration shape in the same (coalesced) axis space
/// as both `op.backing` and `op.writeback`'s strides — i.e.
/// [`PreparedIteration::shape`].
pub(crate) unsafe fn flush_writeback(op: &PreparedOperand, shape: &[usize]) {
    if let Some(wb) = &op.writeback {
        transfer(&op.backing, &wb.dest, shape);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::OperandSpec;

    struct FakeArray {
        shape: Vec<usize>,
        strides: Vec<isize>,
        dtype: Dtype,
        data: std::cell::RefCell<Vec<u8>>,
        writeable: bool,
    }

    unsafe impl crate::operand::RawArrayOperand for FakeArray {
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
            self.data.borrow_mut().as_mut_ptr()
        }
        fn writeable(&self) -> bool {
            self.writeable
        }
    }

    fn i64_array(shape: Vec<usize>, values: &[i64]) -> FakeArray {
        let strides = c_strides(&shape);
        let mut data = vec![0u8; values.len() * 8];
        for (i, v) in values.iter().enumerate() {
            data[i * 8..i * 8 + 8].copy_from_slice(&v.to_ne_bytes());
        }
        FakeArray { shape, strides, dtype: Dtype::I64, data: std::cell::RefCell::new(data), writeable: true }
    }

    #[test]
    fn broadcast_pair_resolves_shape() {
        let a = i64_array(vec![3], &[0, 1, 2]);
        let b = i64_array(vec![2, 1], &[0, 10]);
        let specs = vec![OperandSpec::readonly(&a), OperandSpec::readonly(&b)];
        let prepared = prepare(&specs, &GlobalFlags::default(), Order::K, CastSafety::SameKind, 8).unwrap();
        assert_eq!(prepared.natural_shape, vec![2, 3]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = i64_array(vec![2, 3], &[0; 6]);
        let b = i64_array(vec![2, 2], &[0; 4]);
        let specs = vec![OperandSpec::readonly(&a), OperandSpec::readonly(&b)];
        let err = prepare(&specs, &GlobalFlags::default(), Order::K, CastSafety::SameKind, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn empty_axis_is_rejected() {
        let a = i64_array(vec![0, 3], &[]);
        let specs = vec![OperandSpec::readonly(&a)];
        let err = prepare(&specs, &GlobalFlags::default(), Order::K, CastSafety::SameKind, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyIteration);
    }
}

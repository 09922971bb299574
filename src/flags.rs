// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Runtime flags (§6) as typed enumerations, validated table-style rather
//! than through scattered conditional string parsing (C8).

use crate::error::{ErrorKind, IterError, IterResult};

/// Flags that apply to the iterator as a whole.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalFlags {
    /// Track `coords` on the cursor.
    pub coords: bool,
    /// Track a row-major flat index over the pre-coalesce shape.
    pub c_index: bool,
    /// Track a column-major flat index over the pre-coalesce shape.
    pub f_index: bool,
    /// Expose the innermost axis as a whole chunk instead of one element
    /// at a time.
    pub no_inner_iteration: bool,
    /// Promote every input to one common dtype before iterating.
    pub common_dtype: bool,
    /// Stage operands through aligned contiguous buffers.
    pub buffered: bool,
    /// When buffered and no cast/swap is needed, grow the inner chunk to
    /// the full inner extent.
    pub growinner: bool,
    /// Enable `iterrange` get/set.
    pub ranged: bool,
}

impl GlobalFlags {
    pub fn validate(&self) -> IterResult<()> {
        if self.c_index && self.f_index {
            return Err(IterError::new(ErrorKind::FlagConflict, "c_index and f_index are mutually exclusive"));
        }
        if self.no_inner_iteration && (self.coords || self.c_index || self.f_index) {
            return Err(IterError::new(
                ErrorKind::FlagConflict,
                "no_inner_iteration cannot be combined with coords or c_index/f_index tracking",
            ));
        }
        Ok(())
    }
}

/// Exactly one of these must hold for every operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn may_write(self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }

    pub fn may_read(self) -> bool {
        !matches!(self, AccessMode::WriteOnly)
    }
}

/// Per-operand flags.
#[derive(Copy, Clone, Debug, Default)]
pub struct OperandFlags {
    pub readonly: bool,
    pub writeonly: bool,
    pub readwrite: bool,
    /// Permit a working copy to be made (discarded on release).
    pub copy: bool,
    /// Permit a working copy that casts back into the original on release.
    pub updateifcopy: bool,
    /// Input position was "none": allocate a fresh output operand.
    pub allocate: bool,
    /// Request a working copy if the backing is misaligned or non-native
    /// byte order.
    pub nbo_aligned: bool,
    /// Skip subtype-shape enforcement on an allocated output.
    pub no_subtype: bool,
    /// Forbid the broadcast resolver from introducing stride-0 axes for
    /// this operand.
    pub no_broadcast: bool,
    /// Allow this operand's cast to use the `same_kind` level even if the
    /// global casting level is stricter.
    pub same_kind_casts: bool,
    /// Allow this operand's cast to use the `unsafe` level even if the
    /// global casting level is stricter.
    pub unsafe_casts: bool,
}

impl OperandFlags {
    /// Validates the mode-flag exclusivity rule and, given whether the
    /// backing array is writeable and whether it is a zero-dim scalar,
    /// returns the resolved [`AccessMode`].
    ///
    /// This is the table-driven check from spec.md §6/§7 (`FlagConflict`,
    /// `ReadOnlyOperand`, `TypeError`) collected in one place instead of
    /// being spread across construction.
    pub fn resolve_mode(&self, backing_writeable: bool, is_scalar: bool) -> IterResult<AccessMode> {
        let set_count = self.readonly as u8 + self.writeonly as u8 + self.readwrite as u8;
        if set_count != 1 {
            return Err(IterError::new(
                ErrorKind::FlagConflict,
                "exactly one of readonly/writeonly/readwrite must be set",
            ));
        }
        let requested = if self.readonly {
            AccessMode::ReadOnly
        } else if self.writeonly {
            AccessMode::WriteOnly
        } else {
            AccessMode::ReadWrite
        };

        if is_scalar && requested.may_write() && !backing_writeable {
            return Err(IterError::of(ErrorKind::TypeError));
        }
        if requested.may_write() && !backing_writeable {
            return Err(IterError::of(ErrorKind::ReadOnlyOperand));
        }
        if self.updateifcopy && requested == AccessMode::ReadOnly {
            return Err(IterError::new(
                ErrorKind::FlagConflict,
                "updateifcopy requires a writeable access mode",
            ));
        }
        Ok(requested)
    }
}

/// Axis iteration order, see spec.md §4.2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Order {
    /// Keep: the planner's best order for the operand memory layouts.
    K,
    /// Row-major, outer-to-inner first-to-last axis, no reversal.
    C,
    /// Column-major, outer-to-inner last-to-first axis, no reversal.
    F,
    /// F if every operand is F-contiguous and none is C-contiguous,
    /// otherwise C.
    A,
}

pub use crate::dtype::CastSafety as Casting;

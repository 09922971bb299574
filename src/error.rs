// Copyright (c) the nditer developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error taxonomy for iterator construction and cursor manipulation (C8).
//!
//! `ErrorKind` is a closed, `Copy` enumeration rather than a string-typed
//! error: every failure mode named in the specification gets its own
//! variant so callers can `match` on `kind()` instead of parsing messages.

use std::error::Error;
use std::fmt;

/// Discriminates the reason an operation failed.
///
/// Distinct from a string-typed error: callers branch on `ErrorKind`, never
/// on the `Display` text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Contradictory or missing per-operand mode flags.
    FlagConflict,
    /// Operand shapes cannot be broadcast to a common iteration shape.
    ShapeMismatch,
    /// An operand flagged `no_broadcast` would require stride-0 broadcasting.
    BroadcastDenied,
    /// A supplied `op_axes` mapping is out of bounds, duplicated, or incomplete.
    AxisMapInvalid,
    /// A needed cast exceeds the configured casting level, or needs a copy
    /// that wasn't authorized with `copy`/`allocate`.
    CastNotPermitted,
    /// A cast needs aligned native-byte-order access and none was authorized.
    AlignmentRequired,
    /// A buffered, read-write operand has a stride-0 axis inside a chunk,
    /// making write-back ambiguous.
    BufferWriteMerge,
    /// An output's subtype imposes a shape the iteration result can't satisfy.
    SubtypeShapeConflict,
    /// A write was requested against a non-writeable backing array.
    ReadOnlyOperand,
    /// A write was requested against a coerced-readonly scalar operand.
    TypeError,
    /// Coordinates, an index kind, or a cursor setter was used without the
    /// matching capability flag, or while buffering/`no_inner_iteration`
    /// makes that capability unavailable.
    CapabilityMissing,
    /// An operand has a zero-size axis.
    EmptyIteration,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::FlagConflict => "contradictory or missing operand flags",
            ErrorKind::ShapeMismatch => "operand shapes cannot be broadcast together",
            ErrorKind::BroadcastDenied => "operand forbids broadcasting but shape disagrees",
            ErrorKind::AxisMapInvalid => "op_axes mapping is invalid",
            ErrorKind::CastNotPermitted => "cast is not permitted at the configured casting level",
            ErrorKind::AlignmentRequired => "misaligned or non-native access requires nbo_aligned",
            ErrorKind::BufferWriteMerge => "buffered write-back would merge broadcast elements",
            ErrorKind::SubtypeShapeConflict => "output subtype cannot represent the iteration shape",
            ErrorKind::ReadOnlyOperand => "write requested against a read-only backing",
            ErrorKind::TypeError => "write requested against a scalar operand",
            ErrorKind::CapabilityMissing => "capability was not requested for this iterator",
            ErrorKind::EmptyIteration => "operand has a zero-size axis",
        }
    }
}

/// An error raised while constructing or driving an `NdIter`.
///
/// Carries an [`ErrorKind`] plus a human-readable detail string; the kind is
/// the stable part of the API, the message is for diagnostics only.
#[derive(Clone, Debug)]
pub struct IterError {
    kind: ErrorKind,
    detail: String,
}

impl IterError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        IterError { kind, detail: detail.into() }
    }

    /// Shorthand for an error whose detail is just the kind's description.
    pub(crate) fn of(kind: ErrorKind) -> Self {
        IterError { kind, detail: kind.description().to_string() }
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for IterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.detail)
    }
}

impl Error for IterError {}

pub type IterResult<T> = Result<T, IterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_display() {
        let e = IterError::new(ErrorKind::ShapeMismatch, "(2,3) vs (2,2)");
        assert_eq!(e.kind(), ErrorKind::ShapeMismatch);
        assert!(e.to_string().contains("(2,3) vs (2,2)"));
    }
}

//! Structural diagnostics raised during ingestion and the sweep
//!
//! Nothing here is fatal. Each diagnostic records a trace inconsistency the
//! analyzer recovered from with best-effort attribution; they surface in
//! the report and through `tracing::warn!` at the point of detection.

use serde::Serialize;
use std::fmt;

/// One recovered trace inconsistency
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Two primary regions claim intersecting address ranges, which implies
    /// an unload/reload race in the source trace
    RegionOverlap {
        first: String,
        first_base: u64,
        first_end: u64,
        second: String,
        second_base: u64,
        second_end: u64,
    },
    /// A key was re-registered with a different extent or name; the first
    /// registration was kept
    DuplicateRegistration {
        name: String,
        base: u64,
        existing_size: u64,
        new_size: u64,
    },
    /// A compilation-finished event arrived with no active compilation on
    /// its thread
    CompletionWithoutStart { thread_id: u64, method_id: u64 },
    /// The thread sample counter regressed across a compilation span; the
    /// reported delta was clamped to zero, the raw value is kept here
    SuspiciousSampleDelta { method_id: u64, raw_delta: i64 },
    /// The timestamps of a compilation span are out of order; the reported
    /// delta was clamped to zero, the raw value is kept here
    SuspiciousTimeDelta { method_id: u64, raw_delta_ms: f64 },
    /// A single unmapped address carries a material share of all samples
    UnmappedHotAddress { address: u64, count: u64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::RegionOverlap {
                first,
                first_base,
                first_end,
                second,
                second_base,
                second_end,
            } => write!(
                f,
                "regions {} [{:#x}-{:#x}) and {} [{:#x}-{:#x}) overlap",
                first, first_base, first_end, second, second_base, second_end
            ),
            Diagnostic::DuplicateRegistration {
                name,
                base,
                existing_size,
                new_size,
            } => write!(
                f,
                "{} re-registered at {:#x} with size {:#x} (kept {:#x})",
                name, base, new_size, existing_size
            ),
            Diagnostic::CompletionWithoutStart {
                thread_id,
                method_id,
            } => write!(
                f,
                "compilation of method {:#x} finished on thread {} with no matching start",
                method_id, thread_id
            ),
            Diagnostic::SuspiciousSampleDelta {
                method_id,
                raw_delta,
            } => write!(
                f,
                "negative sample delta {} for method {:#x}, clamped to 0",
                raw_delta, method_id
            ),
            Diagnostic::SuspiciousTimeDelta {
                method_id,
                raw_delta_ms,
            } => write!(
                f,
                "negative time delta {:.3}ms for method {:#x}, clamped to 0",
                raw_delta_ms, method_id
            ),
            Diagnostic::UnmappedHotAddress { address, count } => {
                write!(f, "cannot map address {:#x} ({} samples)", address, count)
            }
        }
    }
}

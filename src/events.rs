//! Decoded trace events consumed by the analyzer
//!
//! The analyzer never decodes an on-disk trace format itself: an external
//! source delivers these already-decoded events in time order, one callback
//! stream for the whole run.

use serde::{Deserialize, Serialize};

/// One decoded, typed trace event.
///
/// Compilation lifecycle events carry no process id; the source scopes them
/// to the traced runtime before they reach the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A process started (or was already running when tracing began)
    ProcessStart {
        pid: u64,
        name: String,
        timestamp: f64,
    },
    /// A binary image was mapped into a process.
    /// `is_prelude` marks events replayed from before live tracing began.
    ImageLoad {
        pid: u64,
        file_name: String,
        base: u64,
        size: u64,
        #[serde(default)]
        is_prelude: bool,
    },
    /// An assembly became known under its qualified name
    AssemblyLoad {
        assembly_id: u64,
        qualified_name: String,
    },
    /// A module was bound to its containing assembly
    ModuleLoad { module_id: u64, assembly_id: u64 },
    /// Code generation for one method began on a thread
    CompilationStart {
        thread_id: u64,
        method_id: u64,
        timestamp: f64,
    },
    /// Code generation finished; the generated body is now live code
    CompilationComplete {
        thread_id: u64,
        method_id: u64,
        module_id: u64,
        method_namespace: String,
        method_name: String,
        method_signature: String,
        timestamp: f64,
        method_start_address: u64,
        method_size: u64,
        is_compiled: bool,
        #[serde(default)]
        is_recompiled: bool,
    },
    /// One hardware PMC sample: the instruction pointer that was executing
    /// when the counter rolled over
    Sample { pid: u64, thread_id: u64, address: u64 },
    /// The PMC reload interval changed; applies to later conversions only
    SampleIntervalChanged { new_interval: u64 },
}

impl TraceEvent {
    /// Stable label for event accounting
    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::ProcessStart { .. } => "process_start",
            TraceEvent::ImageLoad { .. } => "image_load",
            TraceEvent::AssemblyLoad { .. } => "assembly_load",
            TraceEvent::ModuleLoad { .. } => "module_load",
            TraceEvent::CompilationStart { .. } => "compilation_start",
            TraceEvent::CompilationComplete { .. } => "compilation_complete",
            TraceEvent::Sample { .. } => "sample",
            TraceEvent::SampleIntervalChanged { .. } => "sample_interval_changed",
        }
    }
}

//! Derived statistics and the analysis report
//!
//! Pure read-only consumers of the analyzer's final state. Every ratio is
//! guarded by the no-data case: `Report::build` returns `None` when the
//! target process produced no samples, and nothing here divides by zero.

use crate::attribution::{Analyzer, GlobalAggregates};
use crate::compile_tracker::CompilationInvocation;
use crate::diagnostics::Diagnostic;
use crate::region::Region;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Default significance threshold: fraction of total samples a region must
/// reach to be listed
pub const DEFAULT_SIGNIFICANCE: f64 = 0.002;

/// Unknown samples are surfaced once they exceed this fraction of the total
const UNKNOWN_MATERIALITY: f64 = 0.002;

/// Percentile table reported for compilation time deltas
const REPORT_PERCENTILES: [u8; 5] = [50, 75, 90, 95, 99];

/// Regions above `threshold`, ordered by descending sample count, ties by
/// ascending base so the order is stable across runs
pub fn significant_regions(
    regions: &[Region],
    total_samples: u64,
    threshold: f64,
) -> Vec<&Region> {
    if total_samples == 0 {
        return Vec::new();
    }
    let mut significant: Vec<&Region> = regions
        .iter()
        .filter(|r| r.sample_count as f64 / total_samples as f64 > threshold)
        .collect();
    significant.sort_by(|a, b| {
        b.sample_count
            .cmp(&a.sample_count)
            .then(a.base.cmp(&b.base))
    });
    significant
}

/// Completed invocations ranked by exclusive sample cost, ties by method id
pub fn top_k_by_instruction_delta(
    invocations: &[CompilationInvocation],
    k: usize,
) -> Vec<&CompilationInvocation> {
    let mut completed: Vec<&CompilationInvocation> =
        invocations.iter().filter(|inv| inv.is_completed()).collect();
    completed.sort_by(|a, b| {
        b.instruction_delta()
            .cmp(&a.instruction_delta())
            .then(a.method_id.cmp(&b.method_id))
    });
    completed.truncate(k);
    completed
}

/// Completed invocations ranked by exclusive wall-clock cost, ties by
/// method id
pub fn top_k_by_time_delta(
    invocations: &[CompilationInvocation],
    k: usize,
) -> Vec<&CompilationInvocation> {
    let mut completed: Vec<&CompilationInvocation> =
        invocations.iter().filter(|inv| inv.is_completed()).collect();
    completed.sort_by(|a, b| {
        b.time_delta_ms()
            .partial_cmp(&a.time_delta_ms())
            .unwrap_or(Ordering::Equal)
            .then(a.method_id.cmp(&b.method_id))
    });
    completed.truncate(k);
    completed
}

/// Rank-based percentile of completed time deltas, `p` in `[0, 100]`.
///
/// Over the deltas sorted descending, reports the value at
/// `floor(count * (100 - p) / 100)` clamped to `[0, count - 1]`. Rank-based
/// rather than interpolated so the result is bit-exact across runs.
pub fn percentile(invocations: &[CompilationInvocation], p: u8) -> Option<f64> {
    let mut times: Vec<f64> = invocations
        .iter()
        .filter(|inv| inv.is_completed())
        .map(CompilationInvocation::time_delta_ms)
        .collect();
    if times.is_empty() {
        return None;
    }
    times.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let count = times.len();
    let index = count * (100 - usize::from(p.min(100))) / 100;
    Some(times[index.min(count - 1)])
}

/// One region row in the report
#[derive(Debug, Clone, Serialize)]
pub struct RegionRow {
    pub name: String,
    pub kind: &'static str,
    pub samples: u64,
    pub fraction: f64,
    pub estimated_instructions: u64,
}

/// One ranked compilation in the report
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRow {
    pub method_id: u64,
    pub name: String,
    pub thread_id: u64,
    pub instruction_delta: u64,
    pub time_delta_ms: f64,
}

impl InvocationRow {
    fn from_invocation(inv: &CompilationInvocation) -> Self {
        Self {
            method_id: inv.method_id,
            name: inv.display_name(),
            thread_id: inv.thread_id,
            instruction_delta: inv.instruction_delta(),
            time_delta_ms: inv.time_delta_ms(),
        }
    }
}

/// One row of the percentile table
#[derive(Debug, Clone, Serialize)]
pub struct PercentileRow {
    pub percentile: u8,
    pub time_delta_ms: f64,
}

/// The structured analysis result, ready to render as text, JSON or CSV
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub process: String,
    pub pid: Option<u64>,
    pub aggregates: GlobalAggregates,
    pub jit_overhead_fraction: f64,
    pub generated_code_fraction: f64,
    pub compiled_code_fraction: f64,
    /// Present only when unknown samples are material
    pub unknown_fraction: Option<f64>,
    pub compilation_count: usize,
    pub unfinished_compilations: usize,
    pub regions: Vec<RegionRow>,
    pub top_by_samples: Vec<InvocationRow>,
    pub top_by_time: Vec<InvocationRow>,
    pub percentiles: Vec<PercentileRow>,
    pub event_counts: BTreeMap<String, u64>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Build the report from swept analyzer state. Returns `None` when no
    /// samples were observed for the target process; every ratio below is
    /// then undefined and the caller degrades to a "no data" message.
    pub fn build(analyzer: &Analyzer, top_k: usize, significance: f64) -> Option<Self> {
        let aggregates = analyzer.aggregates().clone();
        if aggregates.total_samples == 0 {
            return None;
        }
        let total = aggregates.total_samples as f64;
        let invocations = analyzer.tracker().invocations();

        let unknown_fraction = {
            let fraction = aggregates.unknown_samples as f64 / total;
            (fraction > UNKNOWN_MATERIALITY).then_some(fraction)
        };

        let regions = significant_regions(
            analyzer.registry().all_regions(),
            aggregates.total_samples,
            significance,
        )
        .into_iter()
        .map(|region| RegionRow {
            name: region.name.clone(),
            kind: region.kind_label(),
            samples: region.sample_count,
            fraction: region.sample_count as f64 / total,
            estimated_instructions: region
                .sample_count
                .saturating_mul(aggregates.samples_per_event),
        })
        .collect();

        let top_by_samples = top_k_by_instruction_delta(invocations, top_k)
            .into_iter()
            .map(InvocationRow::from_invocation)
            .collect();
        let top_by_time = top_k_by_time_delta(invocations, top_k)
            .into_iter()
            .map(InvocationRow::from_invocation)
            .collect();
        let percentiles = REPORT_PERCENTILES
            .iter()
            .filter_map(|&p| {
                percentile(invocations, p).map(|time_delta_ms| PercentileRow {
                    percentile: p,
                    time_delta_ms,
                })
            })
            .collect();

        Some(Self {
            process: analyzer.target_name().to_string(),
            pid: analyzer.target_pid(),
            jit_overhead_fraction: aggregates.jit_overhead_samples as f64 / total,
            generated_code_fraction: aggregates.generated_code_samples as f64 / total,
            compiled_code_fraction: aggregates.compiled_code_samples as f64 / total,
            unknown_fraction,
            compilation_count: invocations.len(),
            unfinished_compilations: analyzer.tracker().in_flight_count(),
            regions,
            top_by_samples,
            top_by_time,
            percentiles,
            event_counts: analyzer
                .event_counts()
                .iter()
                .map(|(&kind, &count)| (kind.to_string(), count))
                .collect(),
            diagnostics: analyzer.diagnostics().to_vec(),
            aggregates,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary to stdout
    pub fn print_summary(&self) {
        let aggregates = &self.aggregates;
        println!(
            "Retired instructions for {}: {} samples, {:.3e} instrs",
            self.process,
            aggregates.total_samples,
            aggregates
                .total_samples
                .saturating_mul(aggregates.samples_per_event) as f64
        );
        println!(
            "Jitting           : {:5.2}% ({} methods)",
            self.jit_overhead_fraction * 100.0,
            self.compilation_count
        );
        println!(
            "Jit-generated code: {:5.2}%",
            self.generated_code_fraction * 100.0
        );
        println!(
            "  Jitted code     : {:5.2}%",
            self.compiled_code_fraction * 100.0
        );
        println!();

        if let Some(fraction) = self.unknown_fraction {
            println!(
                "{:5.2}%   {:<10}  {:<7} {}",
                fraction * 100.0,
                aggregates
                    .unknown_samples
                    .saturating_mul(aggregates.samples_per_event),
                "?",
                "Unknown"
            );
        }
        for row in &self.regions {
            println!(
                "{:5.2}%   {:<10}  {:<7} {}",
                row.fraction * 100.0,
                row.estimated_instructions,
                row.kind,
                row.name
            );
        }

        if !self.top_by_samples.is_empty() {
            println!();
            println!("Top compilations by retired samples:");
            for row in &self.top_by_samples {
                println!("  {:>8}   {}", row.instruction_delta, row.name);
            }
        }
        if !self.top_by_time.is_empty() {
            println!();
            println!("Top compilations by wall-clock:");
            for row in &self.top_by_time {
                println!("  {:>8.3}ms {}", row.time_delta_ms, row.name);
            }
        }
        if !self.percentiles.is_empty() {
            println!();
            println!("Compilation time percentiles:");
            for row in &self.percentiles {
                println!("  P{:<3} {:>10.3}ms", row.percentile, row.time_delta_ms);
            }
        }

        if !self.diagnostics.is_empty() {
            println!();
            println!("Diagnostics ({}):", self.diagnostics.len());
            for diag in &self.diagnostics {
                println!("  {}", diag);
            }
        }
    }
}

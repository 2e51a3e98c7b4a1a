//! Analysis session: event routing and the attribution sweep
//!
//! One `Analyzer` owns all mutable state for one trace analysis. Ingestion
//! is a single chronological pass over the event stream; the sweep runs as
//! a second phase because region metadata (an assembly name, a late image
//! load) can complete after related samples were already recorded.

use crate::compile_tracker::CompilationTracker;
use crate::diagnostics::Diagnostic;
use crate::events::TraceEvent;
use crate::ledger::SampleLedger;
use crate::naming::NamingContext;
use crate::region::{RegionFlags, RegionKey, RegionRegistry, RegisterOutcome};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default PMC reload interval: retired instructions represented by one
/// sample event
pub const DEFAULT_SAMPLES_PER_EVENT: u64 = 65_536;

/// Fraction of total samples a single unmapped address must reach before a
/// diagnostic is raised
const UNMAPPED_ADDRESS_THRESHOLD: f64 = 0.001;

/// Running totals for the whole analysis
#[derive(Debug, Clone, Serialize)]
pub struct GlobalAggregates {
    pub total_samples: u64,
    /// Samples claimed by no region
    pub unknown_samples: u64,
    /// Sum of completed invocations' exclusive sample deltas
    pub jit_overhead_samples: u64,
    pub generated_code_samples: u64,
    pub compiled_code_samples: u64,
    pub generated_code_bytes: u64,
    pub managed_method_count: u64,
    pub samples_per_event: u64,
}

impl Default for GlobalAggregates {
    fn default() -> Self {
        Self {
            total_samples: 0,
            unknown_samples: 0,
            jit_overhead_samples: 0,
            generated_code_samples: 0,
            compiled_code_samples: 0,
            generated_code_bytes: 0,
            managed_method_count: 0,
            samples_per_event: DEFAULT_SAMPLES_PER_EVENT,
        }
    }
}

/// All state for one trace analysis
#[derive(Debug)]
pub struct Analyzer {
    target_name: String,
    target_pid: Option<u64>,
    registry: RegionRegistry,
    ledger: SampleLedger,
    tracker: CompilationTracker,
    naming: NamingContext,
    aggregates: GlobalAggregates,
    diagnostics: Vec<Diagnostic>,
    event_counts: BTreeMap<&'static str, u64>,
}

impl Analyzer {
    /// Session for one trace, targeting processes whose name matches
    /// `target_process` case-insensitively (first match binds).
    pub fn new(target_process: &str) -> Self {
        Self {
            target_name: target_process.to_string(),
            target_pid: None,
            registry: RegionRegistry::new(),
            ledger: SampleLedger::new(),
            tracker: CompilationTracker::new(),
            naming: NamingContext::new(),
            aggregates: GlobalAggregates::default(),
            diagnostics: Vec::new(),
            event_counts: BTreeMap::new(),
        }
    }

    /// Consume an entire event stream, then run the sweep
    pub fn analyze<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        for event in events {
            self.handle_event(event);
        }
        self.attribute();
    }

    /// Route one event to the owning component
    pub fn handle_event(&mut self, event: TraceEvent) {
        *self.event_counts.entry(event.kind()).or_insert(0) += 1;

        match event {
            TraceEvent::ProcessStart {
                pid,
                name,
                timestamp: _,
            } => {
                if self.target_pid.is_none() && name.eq_ignore_ascii_case(&self.target_name) {
                    tracing::debug!(pid, process = %name, "bound target process");
                    self.target_pid = Some(pid);
                }
            }
            TraceEvent::ImageLoad {
                pid,
                file_name,
                base,
                size,
                is_prelude,
            } => self.handle_image_load(pid, &file_name, base, size, is_prelude),
            TraceEvent::AssemblyLoad {
                assembly_id,
                qualified_name,
            } => self.naming.add_assembly(assembly_id, &qualified_name),
            TraceEvent::ModuleLoad {
                module_id,
                assembly_id,
            } => self.naming.add_module(module_id, assembly_id),
            TraceEvent::CompilationStart {
                thread_id,
                method_id,
                timestamp,
            } => {
                self.tracker
                    .begin(thread_id, method_id, timestamp, &mut self.ledger);
            }
            TraceEvent::CompilationComplete {
                thread_id,
                method_id,
                module_id,
                method_namespace,
                method_name,
                method_signature,
                timestamp,
                method_start_address,
                method_size,
                is_compiled,
                is_recompiled,
            } => self.handle_compilation_complete(
                thread_id,
                method_id,
                module_id,
                &method_namespace,
                &method_name,
                &method_signature,
                timestamp,
                method_start_address,
                method_size,
                is_compiled,
                is_recompiled,
            ),
            TraceEvent::Sample {
                pid,
                thread_id,
                address,
            } => {
                if Some(pid) == self.target_pid {
                    self.ledger.record_sample(address, 1);
                    self.ledger.record_thread_sample(thread_id, 1);
                }
            }
            TraceEvent::SampleIntervalChanged { new_interval } => {
                // Applies to conversions from here on, never retroactively.
                self.aggregates.samples_per_event = new_interval;
            }
        }
    }

    fn handle_image_load(
        &mut self,
        pid: u64,
        file_name: &str,
        base: u64,
        size: u64,
        is_prelude: bool,
    ) {
        let accepted = if is_prelude {
            pid == 0 || Some(pid) == self.target_pid
        } else {
            Some(pid) == self.target_pid
        };
        if !accepted {
            return;
        }

        // Precompiled framework images are suppressed on live loads so
        // generated-method regions keep claiming their addresses.
        if !is_prelude && file_name.contains(".ni.") {
            return;
        }

        let short_name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name)
            .to_string();
        let flags = RegionFlags {
            // System-wide prelude images are second-tier: their load events
            // predate live tracing and their ranges are trusted only when
            // no primary region claims the address.
            is_fallback: is_prelude && pid == 0,
            ..Default::default()
        };
        let key = RegionKey::Module {
            name: file_name.to_string(),
            base,
        };
        self.register_region(key, short_name, base, size, flags);
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_compilation_complete(
        &mut self,
        thread_id: u64,
        method_id: u64,
        module_id: u64,
        method_namespace: &str,
        method_name: &str,
        method_signature: &str,
        timestamp: f64,
        method_start_address: u64,
        method_size: u64,
        is_compiled: bool,
        is_recompiled: bool,
    ) {
        let display =
            self.naming
                .method_display_name(module_id, method_namespace, method_name, method_signature);

        match self
            .tracker
            .complete(thread_id, timestamp, display.clone(), &self.ledger)
        {
            Some(idx) => {
                let invocation = self.tracker.get(idx);
                if let Some(raw) = invocation.raw_instruction_delta() {
                    if raw < 0 {
                        tracing::warn!(method_id, raw, "negative sample delta, clamping");
                        self.diagnostics.push(Diagnostic::SuspiciousSampleDelta {
                            method_id,
                            raw_delta: raw,
                        });
                    }
                }
                if let Some(raw_ms) = invocation.raw_time_delta_ms() {
                    if raw_ms < 0.0 {
                        tracing::warn!(method_id, raw_ms, "negative time delta, clamping");
                        self.diagnostics.push(Diagnostic::SuspiciousTimeDelta {
                            method_id,
                            raw_delta_ms: raw_ms,
                        });
                    }
                }
                self.aggregates.jit_overhead_samples += self.tracker.get(idx).instruction_delta();
                self.aggregates.generated_code_bytes += method_size;
                self.aggregates.managed_method_count += 1;
            }
            None => {
                tracing::warn!(thread_id, method_id, "completion without matching start");
                self.diagnostics.push(Diagnostic::CompletionWithoutStart {
                    thread_id,
                    method_id,
                });
            }
        }

        // The generated body becomes a region regardless of whether the
        // start event was seen; samples landing in it must still attribute.
        let flags = RegionFlags {
            is_generated_code: true,
            is_compiled,
            is_recompiled,
            is_fallback: false,
        };
        self.register_region(
            RegionKey::Method(method_id),
            display,
            method_start_address,
            method_size,
            flags,
        );
    }

    fn register_region(
        &mut self,
        key: RegionKey,
        name: String,
        base: u64,
        size: u64,
        flags: RegionFlags,
    ) {
        if let RegisterOutcome::Mismatch(idx) = self.registry.register(key, name, base, size, flags)
        {
            let existing = self.registry.get(idx);
            tracing::warn!(
                name = %existing.name,
                base,
                existing_size = existing.size,
                new_size = size,
                "divergent re-registration ignored"
            );
            self.diagnostics.push(Diagnostic::DuplicateRegistration {
                name: existing.name.clone(),
                base,
                existing_size: existing.size,
                new_size: size,
            });
        }
    }

    /// Second phase: assign every ledger address to a region or to unknown.
    /// Regions are frozen once the event stream has ended; call this once.
    pub fn attribute(&mut self) {
        let (primary, fallback) = self.registry.sorted_partition();
        self.detect_overlaps(&primary);

        let total = self.ledger.total_samples();
        let mut primary_idx = 0usize;
        let mut fallback_idx = 0usize;

        let Self {
            registry,
            ledger,
            aggregates,
            diagnostics,
            ..
        } = self;

        for (address, count) in ledger.ordered_addresses() {
            let claimed = scan_claim(registry, &primary, &mut primary_idx, address)
                .or_else(|| scan_claim(registry, &fallback, &mut fallback_idx, address));

            match claimed {
                Some(region_idx) => {
                    registry.add_samples(region_idx, count);
                    let flags = registry.get(region_idx).flags;
                    if flags.is_generated_code {
                        aggregates.generated_code_samples += count;
                    }
                    if flags.is_compiled {
                        aggregates.compiled_code_samples += count;
                    }
                }
                None => {
                    aggregates.unknown_samples += count;
                    if total > 0 && count as f64 / total as f64 > UNMAPPED_ADDRESS_THRESHOLD {
                        tracing::warn!(address, count, "cannot map hot address");
                        diagnostics.push(Diagnostic::UnmappedHotAddress { address, count });
                    }
                }
            }
        }

        self.aggregates.total_samples = self.ledger.total_samples();
    }

    /// Consecutive primary regions with intersecting intervals (other than
    /// exact duplicates) imply an inconsistent load/unload sequence.
    fn detect_overlaps(&mut self, primary: &[usize]) {
        for pair in primary.windows(2) {
            let first = self.registry.get(pair[0]);
            let second = self.registry.get(pair[1]);
            if second.base < first.end {
                let exact_duplicate = first.base == second.base
                    && first.end == second.end
                    && first.name == second.name;
                if !exact_duplicate {
                    let diag = Diagnostic::RegionOverlap {
                        first: first.name.clone(),
                        first_base: first.base,
                        first_end: first.end,
                        second: second.name.clone(),
                        second_base: second.base,
                        second_end: second.end,
                    };
                    tracing::warn!(%diag, "overlapping primary regions");
                    self.diagnostics.push(diag);
                }
            }
        }
    }

    pub fn target_pid(&self) -> Option<u64> {
        self.target_pid
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &SampleLedger {
        &self.ledger
    }

    pub fn tracker(&self) -> &CompilationTracker {
        &self.tracker
    }

    pub fn aggregates(&self) -> &GlobalAggregates {
        &self.aggregates
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn event_counts(&self) -> &BTreeMap<&'static str, u64> {
        &self.event_counts
    }
}

/// Forward scan from the cursor for the first region containing `address`.
/// The cursor moves only on a claim, so a repeated or slightly regressed
/// address can still match the last claiming region; anything below the
/// cursor's base is deliberately out of reach.
fn scan_claim(
    registry: &RegionRegistry,
    order: &[usize],
    cursor: &mut usize,
    address: u64,
) -> Option<usize> {
    let mut i = *cursor;
    while i < order.len() {
        let region = registry.get(order[i]);
        if address < region.base {
            break;
        }
        if address < region.end {
            *cursor = i;
            return Some(order[i]);
        }
        i += 1;
    }
    None
}

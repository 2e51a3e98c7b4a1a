//! End-to-end attribution scenarios against the library API

use retirar::attribution::Analyzer;
use retirar::diagnostics::Diagnostic;
use retirar::events::TraceEvent;
use retirar::report::{percentile, Report, DEFAULT_SIGNIFICANCE};

fn process_start(pid: u64, name: &str) -> TraceEvent {
    TraceEvent::ProcessStart {
        pid,
        name: name.to_string(),
        timestamp: 0.0,
    }
}

fn image_load(pid: u64, name: &str, base: u64, size: u64, is_prelude: bool) -> TraceEvent {
    TraceEvent::ImageLoad {
        pid,
        file_name: name.to_string(),
        base,
        size,
        is_prelude,
    }
}

fn sample(pid: u64, thread_id: u64, address: u64) -> TraceEvent {
    TraceEvent::Sample {
        pid,
        thread_id,
        address,
    }
}

fn compilation_start(thread_id: u64, method_id: u64, timestamp: f64) -> TraceEvent {
    TraceEvent::CompilationStart {
        thread_id,
        method_id,
        timestamp,
    }
}

fn compilation_complete(
    thread_id: u64,
    method_id: u64,
    timestamp: f64,
    address: u64,
    size: u64,
) -> TraceEvent {
    TraceEvent::CompilationComplete {
        thread_id,
        method_id,
        module_id: 2,
        method_namespace: "Bench.Worker".to_string(),
        method_name: format!("M{:x}", method_id),
        method_signature: "void M()".to_string(),
        timestamp,
        method_start_address: address,
        method_size: size,
        is_compiled: true,
        is_recompiled: false,
    }
}

#[test]
fn test_single_region_scenario() {
    // One native module, three mapped samples, one unmapped.
    let mut analyzer = Analyzer::new("app");
    let mut events = vec![
        process_start(10, "app"),
        image_load(10, "Native.dll", 0x1000, 0x500, false),
    ];
    events.extend(std::iter::repeat_with(|| sample(10, 1, 0x1200)).take(3));
    events.push(sample(10, 1, 0x9999));

    analyzer.analyze(events);

    let aggregates = analyzer.aggregates();
    assert_eq!(aggregates.total_samples, 4);
    assert_eq!(aggregates.unknown_samples, 1);
    let region = analyzer
        .registry()
        .all_regions()
        .iter()
        .find(|r| r.name == "Native.dll")
        .unwrap();
    assert_eq!(region.sample_count, 3);
}

#[test]
fn test_conservation_over_mixed_stream() {
    let mut analyzer = Analyzer::new("app");
    let mut events = vec![process_start(10, "app")];
    for i in 0..20u64 {
        events.push(image_load(
            10,
            &format!("mod{}.dll", i),
            0x1_0000 * (i + 1),
            0x8000,
            false,
        ));
    }
    for i in 0..500u64 {
        // Every third sample lands in a gap between modules.
        let address = 0x1_0000 + i * 0x700 + if i % 3 == 0 { 0x9000 } else { 0 };
        events.push(sample(10, i % 4, address));
    }
    analyzer.analyze(events);

    let attributed: u64 = analyzer
        .registry()
        .all_regions()
        .iter()
        .map(|r| r.sample_count)
        .sum();
    let aggregates = analyzer.aggregates();
    assert_eq!(
        attributed + aggregates.unknown_samples,
        aggregates.total_samples
    );
}

#[test]
fn test_jit_cost_tracking_with_nesting() {
    let mut analyzer = Analyzer::new("app");
    analyzer.handle_event(process_start(10, "app"));

    // Outer compilation triggers an inner one on the same thread.
    analyzer.handle_event(compilation_start(1, 0xa, 0.0));
    for _ in 0..3 {
        analyzer.handle_event(sample(10, 1, 0x100));
    }
    analyzer.handle_event(compilation_start(1, 0xb, 1.0));
    for _ in 0..5 {
        analyzer.handle_event(sample(10, 1, 0x200));
    }
    analyzer.handle_event(compilation_complete(1, 0xb, 2.0, 0x9000, 0x80));
    for _ in 0..2 {
        analyzer.handle_event(sample(10, 1, 0x300));
    }
    analyzer.handle_event(compilation_complete(1, 0xa, 4.0, 0xa000, 0x100));
    analyzer.attribute();

    let invocations = analyzer.tracker().invocations();
    assert_eq!(invocations.len(), 2);
    let outer = &invocations[0];
    let inner = &invocations[1];
    assert_eq!(inner.instruction_delta(), 5);
    // Outer covers the full span from its own snapshots, independent of
    // how much of the increase happened inside the inner invocation.
    assert_eq!(outer.instruction_delta(), 10);
    // Overhead totals each invocation's own window: 10 + 5.
    assert_eq!(analyzer.aggregates().jit_overhead_samples, 15);
    assert_eq!(analyzer.aggregates().managed_method_count, 2);
    assert_eq!(analyzer.aggregates().generated_code_bytes, 0x180);
}

#[test]
fn test_overlap_detected_only_between_primaries() {
    let mut analyzer = Analyzer::new("app");
    analyzer.handle_event(process_start(10, "app"));
    analyzer.handle_event(image_load(10, "a.dll", 0x1000, 0x1000, false));
    analyzer.handle_event(image_load(10, "b.dll", 0x1800, 0x1000, false));
    // Fallback covering the same range as a primary must not warn.
    analyzer.handle_event(image_load(0, "sys.dll", 0x1000, 0x1000, true));
    analyzer.attribute();

    let overlaps: Vec<&Diagnostic> = analyzer
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, Diagnostic::RegionOverlap { .. }))
        .collect();
    assert_eq!(overlaps.len(), 1);
    match overlaps[0] {
        Diagnostic::RegionOverlap { first, second, .. } => {
            assert_eq!(first, "a.dll");
            assert_eq!(second, "b.dll");
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_report_no_data_when_process_missing() {
    let mut analyzer = Analyzer::new("ghost");
    analyzer.analyze(vec![
        process_start(10, "app"),
        image_load(10, "Native.dll", 0x1000, 0x500, false),
        sample(10, 1, 0x1200),
    ]);

    assert_eq!(analyzer.target_pid(), None);
    assert!(Report::build(&analyzer, 10, DEFAULT_SIGNIFICANCE).is_none());
}

#[test]
fn test_report_percentiles_from_real_invocations() {
    let mut analyzer = Analyzer::new("app");
    analyzer.handle_event(process_start(10, "app"));
    for i in 1..=10u64 {
        analyzer.handle_event(compilation_start(i, i, 0.0));
        analyzer.handle_event(compilation_complete(i, i, i as f64, 0x1000 * i, 0x10));
    }
    analyzer.attribute();

    // Times are [1..10] ms; descending index floor(10 * 10 / 100) = 1 -> 9.
    assert_eq!(percentile(analyzer.tracker().invocations(), 90), Some(9.0));
    assert_eq!(percentile(analyzer.tracker().invocations(), 100), Some(10.0));
    assert_eq!(percentile(analyzer.tracker().invocations(), 0), Some(1.0));
}

#[test]
fn test_report_ranks_top_compilations() {
    let mut analyzer = Analyzer::new("app");
    analyzer.handle_event(process_start(10, "app"));

    for (method_id, cost) in [(0x1u64, 2u64), (0x2, 9), (0x3, 5)] {
        analyzer.handle_event(compilation_start(method_id, method_id, 0.0));
        for _ in 0..cost {
            analyzer.handle_event(sample(10, method_id, 0x40_0000));
        }
        analyzer.handle_event(compilation_complete(
            method_id,
            method_id,
            cost as f64,
            0x8000 * method_id,
            0x40,
        ));
    }
    analyzer.attribute();

    let report = Report::build(&analyzer, 2, DEFAULT_SIGNIFICANCE).unwrap();
    assert_eq!(report.top_by_samples.len(), 2);
    assert_eq!(report.top_by_samples[0].method_id, 0x2);
    assert_eq!(report.top_by_samples[0].instruction_delta, 9);
    assert_eq!(report.top_by_samples[1].method_id, 0x3);
    assert_eq!(report.top_by_time[0].method_id, 0x2);
}

#[test]
fn test_generated_region_samples_classified() {
    let mut analyzer = Analyzer::new("app");
    analyzer.handle_event(process_start(10, "app"));
    analyzer.handle_event(compilation_start(1, 0x7, 0.0));
    analyzer.handle_event(compilation_complete(1, 0x7, 1.0, 0x9000, 0x100));
    for _ in 0..4 {
        analyzer.handle_event(sample(10, 1, 0x9080));
    }
    analyzer.attribute();

    let aggregates = analyzer.aggregates();
    assert_eq!(aggregates.generated_code_samples, 4);
    assert_eq!(aggregates.compiled_code_samples, 4);

    let report = Report::build(&analyzer, 10, DEFAULT_SIGNIFICANCE).unwrap();
    assert_eq!(report.regions.len(), 1);
    assert_eq!(report.regions[0].kind, "jit");
    assert!(report.regions[0].name.contains("Worker.M7"));
}

#[test]
fn test_sample_interval_scales_estimated_instructions() {
    let mut analyzer = Analyzer::new("app");
    analyzer.handle_event(process_start(10, "app"));
    analyzer.handle_event(TraceEvent::SampleIntervalChanged { new_interval: 1000 });
    analyzer.handle_event(image_load(10, "Native.dll", 0x1000, 0x500, false));
    for _ in 0..10 {
        analyzer.handle_event(sample(10, 1, 0x1200));
    }
    analyzer.attribute();

    let report = Report::build(&analyzer, 10, DEFAULT_SIGNIFICANCE).unwrap();
    assert_eq!(report.aggregates.samples_per_event, 1000);
    assert_eq!(report.regions[0].estimated_instructions, 10_000);
}

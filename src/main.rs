use anyhow::{Context, Result};
use clap::Parser;
use retirar::attribution::Analyzer;
use retirar::cli::{Cli, OutputFormat};
use retirar::csv_output::CsvOutput;
use retirar::report::Report;
use retirar::trace_reader;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Validate significance range (a fraction, not a percentage)
    if !(0.0..1.0).contains(&args.significance) {
        anyhow::bail!(
            "Invalid value for --significance: {} (must be in [0, 1))",
            args.significance
        );
    }

    init_tracing(args.debug);

    let events = trace_reader::read_events(&args.trace)
        .with_context(|| format!("reading trace {}", args.trace.display()))?;
    eprintln!(
        "[retirar: {} events from {} for process {}]",
        events.len(),
        args.trace.display(),
        args.process
    );

    let mut analyzer = Analyzer::new(&args.process);
    analyzer.analyze(events);

    if analyzer.target_pid().is_none() {
        eprintln!("[retirar: process {} never seen in trace]", args.process);
    }

    match Report::build(&analyzer, args.top, args.significance) {
        Some(report) => match args.format {
            OutputFormat::Text => report.print_summary(),
            OutputFormat::Json => println!("{}", report.to_json()?),
            OutputFormat::Csv => print!("{}", CsvOutput::from_report(&report).to_csv()),
        },
        None => eprintln!("No samples recorded for {}.", args.process),
    }

    Ok(())
}

//! CLI argument parsing for Retirar

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the attribution report
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV region breakdown for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "retirar")]
#[command(version)]
#[command(about = "Attribute retired-instruction samples to native, precompiled and jitted code", long_about = None)]
pub struct Cli {
    /// Decoded trace file (one JSON event per line)
    pub trace: PathBuf,

    /// Process to analyze (first case-insensitive name match binds)
    #[arg(short = 'P', long = "process", default_value = "corerun")]
    pub process: String,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Entries in each top-cost compilation list
    #[arg(long = "top", value_name = "N", default_value = "10")]
    pub top: usize,

    /// Minimum fraction of total samples a region must reach to be listed
    #[arg(
        long = "significance",
        value_name = "FRACTION",
        default_value = "0.002"
    )]
    pub significance: f64,

    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug: bool,
}

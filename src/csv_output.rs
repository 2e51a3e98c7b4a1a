//! CSV output for the attribution report

use crate::report::Report;

/// CSV row for one attributed region
#[derive(Debug, Clone)]
pub struct CsvRegionRow {
    pub name: String,
    pub kind: &'static str,
    pub samples: u64,
    pub fraction: f64,
    pub estimated_instructions: u64,
}

/// CSV output formatter for the region breakdown
#[derive(Debug, Default)]
pub struct CsvOutput {
    rows: Vec<CsvRegionRow>,
}

impl CsvOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region rows from a built report, including the unknown bucket when
    /// the report surfaced it
    pub fn from_report(report: &Report) -> Self {
        let mut output = Self::new();
        if let Some(fraction) = report.unknown_fraction {
            output.add_row(CsvRegionRow {
                name: "Unknown".to_string(),
                kind: "?",
                samples: report.aggregates.unknown_samples,
                fraction,
                estimated_instructions: report
                    .aggregates
                    .unknown_samples
                    .saturating_mul(report.aggregates.samples_per_event),
            });
        }
        for row in &report.regions {
            output.add_row(CsvRegionRow {
                name: row.name.clone(),
                kind: row.kind,
                samples: row.samples,
                fraction: row.fraction,
                estimated_instructions: row.estimated_instructions,
            });
        }
        output
    }

    pub fn add_row(&mut self, row: CsvRegionRow) {
        self.rows.push(row);
    }

    /// Escape CSV field (handle commas, quotes, newlines)
    fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn format_row(row: &CsvRegionRow) -> String {
        format!(
            "{},{},{},{:.6},{}",
            Self::escape_field(&row.name),
            row.kind,
            row.samples,
            row.fraction,
            row.estimated_instructions
        )
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::from("region,kind,samples,fraction,estimated_instructions\n");
        for row in &self.rows {
            output.push_str(&Self::format_row(row));
            output.push('\n');
        }
        output
    }
}

//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;
use tide_autoscaler::{LoadPattern, ScalingStatistics};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for ScalingStatistics {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Scaling Statistics")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Generated:        {}", self.generated_at.to_rfc3339())?;
        writeln!(writer)?;

        if self.targets.is_empty() {
            writeln!(writer, "No scaling targets")?;
        } else {
            writeln!(
                writer,
                "{:<20}  {:<13}  {:>9}  {:>9}  {:<11}  {:<9}",
                "TARGET", "KIND", "INSTANCES", "RANGE", "STATUS", "PATTERN"
            )?;
            writeln!(writer, "{}", "─".repeat(82))?;
            for target in &self.targets {
                let pattern = self
                    .patterns
                    .iter()
                    .find(|p| p.target_id == target.id)
                    .map_or_else(|| "-".to_string(), |p| p.pattern_type.to_string());
                writeln!(
                    writer,
                    "{:<20}  {:<13}  {:>9}  {:>9}  {:<11}  {:<9}",
                    truncate(target.id.as_str(), 20),
                    target.kind,
                    target.current_instances,
                    format!("{}-{}", target.min_instances, target.max_instances),
                    format!("{:?}", target.status).to_lowercase(),
                    pattern
                )?;
            }
        }
        writeln!(writer)?;

        let counts = self.action_counts;
        writeln!(writer, "Actions")?;
        writeln!(writer, "  Pending:        {}", counts.pending)?;
        writeln!(writer, "  In progress:    {}", counts.in_progress)?;
        writeln!(writer, "  Completed:      {}", counts.completed)?;
        writeln!(writer, "  Failed:         {}", counts.failed)?;
        writeln!(writer, "  Cancelled:      {}", counts.cancelled)?;
        writeln!(writer)?;
        writeln!(writer, "Completed cost:   {:.3}/h", self.total_completed_cost)?;
        writeln!(writer, "Avg response:     {:.1} ms", self.average_response_time)?;

        let recent: Vec<_> = self.actions.iter().rev().take(10).collect();
        if !recent.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Recent actions")?;
            for action in recent.into_iter().rev() {
                writeln!(
                    writer,
                    "  {}  {:<20}  {:<10}  {:>3} -> {:<3}  {:<8}  {}",
                    action.created_at.format("%H:%M:%S"),
                    truncate(action.target_id.as_str(), 20),
                    action.action_type,
                    action.current_instances,
                    action.target_instances,
                    action.priority,
                    action.status
                )?;
            }
        }

        Ok(())
    }
}

impl TableDisplay for LoadPattern {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let peak_hours = if self.peak_hours.is_empty() {
            "none".to_string()
        } else {
            self.peak_hours
                .iter()
                .map(|h| format!("{h:02}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        writeln!(writer, "Load Pattern: {}", self.target_id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(
            writer,
            "Pattern:          {} (confidence {:.2})",
            self.pattern_type, self.confidence
        )?;
        writeln!(writer, "Recommendation:   {}", self.recommendation)?;
        writeln!(writer, "Average load:     {:.2}", self.average_load)?;
        writeln!(writer, "Peak load:        {:.2}", self.peak_load)?;
        writeln!(writer, "Peak hours:       {peak_hours}")?;
        writeln!(writer)?;
        writeln!(writer, "Variation:        {:.3}", self.coefficient_of_variation)?;
        writeln!(writer, "Trend:            {:.3}", self.trend)?;
        writeln!(writer, "Autocorrelation:  {:.3}", self.autocorrelation)?;
        writeln!(writer, "Samples:          {}", self.sample_count)?;
        Ok(())
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

//! Model of the JSON coverage report written by the test framework.
//!
//! Only the fields the engine and its callers read are modelled; anything else
//! in the document is ignored so newer report formats still parse.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Parsed coverage report: per-file line and branch coverage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Report metadata
    #[serde(default)]
    pub meta: CoverageMeta,
    /// Coverage keyed by source file path
    #[serde(default)]
    pub files: BTreeMap<String, FileCoverage>,
    /// Aggregate numbers across all files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<CoverageSummary>,
}

/// Information about the tool that produced the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageMeta {
    /// Coverage tool version
    #[serde(default)]
    pub version: Option<String>,
    /// When the report was written
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Whether branch coverage was measured
    #[serde(default)]
    pub branch_coverage: bool,
}

/// Coverage for a single source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCoverage {
    /// Lines that ran
    #[serde(default)]
    pub executed_lines: Vec<u32>,
    /// Statements that never ran
    #[serde(default)]
    pub missing_lines: Vec<u32>,
    /// Lines excluded from measurement
    #[serde(default)]
    pub excluded_lines: Vec<u32>,
    /// Arcs taken, as `(from, to)`; negative targets denote exits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_branches: Option<Vec<(i64, i64)>>,
    /// Arcs never taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_branches: Option<Vec<(i64, i64)>>,
    /// Per-file totals
    #[serde(default)]
    pub summary: CoverageSummary,
}

/// Counters summarising a file or a whole report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Statements executed
    #[serde(default)]
    pub covered_lines: u64,
    /// Statements measured
    #[serde(default)]
    pub num_statements: u64,
    /// Statements not executed
    #[serde(default)]
    pub missing_lines: u64,
    /// Statements excluded
    #[serde(default)]
    pub excluded_lines: u64,
    /// Coverage percentage
    #[serde(default)]
    pub percent_covered: f64,
    /// Branches measured, when branch coverage is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_branches: Option<u64>,
    /// Branches taken, when branch coverage is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covered_branches: Option<u64>,
}

impl CoverageReport {
    /// Parse a report from its JSON text.
    ///
    /// # Errors
    /// Returns an error if the text is not a JSON coverage document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// A report with no file entries carries no coverage at all.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of files in the report.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Executed lines for `file`, if the report mentions it.
    pub fn executed_lines(&self, file: &str) -> Option<&[u32]> {
        self.files
            .get(file)
            .map(|coverage| coverage.executed_lines.as_slice())
    }

    /// Executed lines summed over every file.
    pub fn total_executed_lines(&self) -> usize {
        self.files
            .values()
            .map(|coverage| coverage.executed_lines.len())
            .sum()
    }
}

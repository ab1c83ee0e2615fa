//! Per-group CSV sections and the JSON run summary
//!
//! Each succeeded group gets one CSV section named after its key. Names are
//! limited to 31 characters (the workbook sheet-name limit), so two long keys
//! can end up with the same name; later ones get a `~2`, `~3`, ... suffix.
//! The stems of the run-level files are reserved and never used as sections.

use crate::aggregate::{group_rows, AggregatedForecasts};
use crate::data::Metric;
use crate::error::Result;
use crate::pipeline::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Longest section name
pub const MAX_SECTION_NAME: usize = 31;

/// File stems written next to the sections
pub const RESERVED_SECTION_NAMES: [&str; 2] = ["combined", "summary"];

const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Make a group key usable as a section and file name
pub fn sanitize_section_name(key: &str) -> String {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '_' } else { c })
        .take(MAX_SECTION_NAME)
        .collect();
    let cleaned = cleaned.trim_end();

    if cleaned.is_empty() {
        "group".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Section names for `keys`, unique within the list
pub fn assign_section_names<'a, I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut used: HashSet<String> = RESERVED_SECTION_NAMES.iter().map(|n| n.to_string()).collect();
    let mut names = Vec::new();

    for key in keys {
        let base = sanitize_section_name(key);
        let mut name = base.clone();
        let mut n = 2;
        // case-insensitive, like workbook sheets and most file systems
        while used.contains(&name.to_lowercase()) {
            let suffix = format!("~{}", n);
            let stem: String = base
                .chars()
                .take(MAX_SECTION_NAME - suffix.chars().count())
                .collect();
            name = format!("{}{}", stem, suffix);
            n += 1;
        }
        if name != base {
            warn!(group = key, section = %name, "Section name collision, renamed");
        }
        used.insert(name.to_lowercase());
        names.push(name);
    }

    names
}

/// A written section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub group_key: String,
    pub section: String,
    pub file: String,
}

/// A group without a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedGroup {
    pub group_key: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Contents of `summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub metric: Metric,
    pub group_column: String,
    pub succeeded: usize,
    pub failed: usize,
    pub sections: Vec<SectionEntry>,
    pub skipped: Vec<SkippedGroup>,
}

impl RunSummary {
    /// Build the summary without writing anything
    pub fn from_forecasts(forecasts: &AggregatedForecasts, group_column: &str) -> Self {
        let names = assign_section_names(forecasts.forecasts.iter().map(|(k, _)| k.as_str()));
        let sections = forecasts
            .forecasts
            .iter()
            .zip(names)
            .map(|((key, _), section)| SectionEntry {
                group_key: key.clone(),
                file: format!("{}.csv", section),
                section,
            })
            .collect();
        let skipped = forecasts
            .failures
            .iter()
            .map(|(key, reason)| SkippedGroup {
                group_key: key.clone(),
                kind: reason.kind,
                reason: reason.message.clone(),
            })
            .collect();

        Self {
            metric: forecasts.metric,
            group_column: group_column.to_string(),
            succeeded: forecasts.success_count(),
            failed: forecasts.failure_count(),
            sections,
            skipped,
        }
    }
}

/// Writes report files for one metric into a directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    group_column: String,
}

impl ReportWriter {
    /// `group_column` is the header used for the group key column
    pub fn new<P: AsRef<Path>>(output_dir: P, group_column: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            group_column: group_column.into(),
        }
    }

    /// Directory the files of `metric` go to
    pub fn metric_dir(&self, metric: Metric) -> PathBuf {
        self.output_dir.join(metric.label())
    }

    /// Write one CSV per succeeded group, `combined.csv` and `summary.json`
    pub fn write(&self, forecasts: &AggregatedForecasts) -> Result<RunSummary> {
        let dir = self.metric_dir(forecasts.metric);
        fs::create_dir_all(&dir)?;

        let summary = RunSummary::from_forecasts(forecasts, &self.group_column);
        for ((key, result), entry) in forecasts.forecasts.iter().zip(summary.sections.iter()) {
            let mut writer = csv::Writer::from_path(dir.join(&entry.file))?;
            writer.write_record([
                "Forecast_Month",
                "Forecast",
                "Lower_CI",
                "Upper_CI",
                self.group_column.as_str(),
            ])?;
            for row in group_rows(key, result) {
                writer.write_record([
                    row.period.format("%Y-%m-%d").to_string(),
                    row.forecast.to_string(),
                    row.lower.to_string(),
                    row.upper.to_string(),
                    row.group_key,
                ])?;
            }
            writer.flush()?;
        }

        let mut combined = csv::Writer::from_path(dir.join(format!("{}.csv", RESERVED_SECTION_NAMES[0])))?;
        combined.write_record([self.group_column.as_str(), "Month", "Value", "Kind"])?;
        for row in forecasts.combined_rows() {
            combined.write_record([
                row.group_key,
                row.period.format("%Y-%m-%d").to_string(),
                row.value.to_string(),
                format!("{:?}", row.kind),
            ])?;
        }
        combined.flush()?;

        fs::write(dir.join(format!("{}.json", RESERVED_SECTION_NAMES[1])), serde_json::to_string_pretty(&summary)?)?;

        info!(
            metric = %forecasts.metric,
            sections = summary.sections.len(),
            dir = %dir.display(),
            "Reports written"
        );
        Ok(summary)
    }
}

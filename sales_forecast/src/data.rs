//! Sales table loading
//!
//! The source export is a flat table with a group column, a month column and
//! one or two aggregated metric columns (`Sum(Units_Sold)`,
//! `Sum(Net_Revenue)`). Everything is read as text and parsed here so a bad
//! metric cell becomes a missing value instead of failing the load.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// The quantity being forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Units,
    Revenue,
}

impl Metric {
    /// Short lowercase name, used for output directories
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Units => "units",
            Metric::Revenue => "revenue",
        }
    }

    /// Column name in the source export
    pub fn default_column(&self) -> &'static str {
        match self {
            Metric::Units => "Sum(Units_Sold)",
            Metric::Revenue => "Sum(Net_Revenue)",
        }
    }

    /// Divisor applied before fitting.
    ///
    /// Revenue figures are in the hundreds of thousands; dividing keeps the
    /// likelihood surface well conditioned.
    pub fn default_scale(&self) -> f64 {
        match self {
            Metric::Units => 1.0,
            Metric::Revenue => 100_000.0,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Units => write!(f, "Units_Sold"),
            Metric::Revenue => write!(f, "Revenue"),
        }
    }
}

/// The grouping dimension of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupDimension {
    Dealer,
    State,
    Model,
    /// Any other column
    Column(String),
}

impl GroupDimension {
    /// Column holding the group key
    pub fn column(&self) -> &str {
        match self {
            GroupDimension::Dealer => "Dealer_ID",
            GroupDimension::State => "State",
            GroupDimension::Model => "Model",
            GroupDimension::Column(name) => name,
        }
    }
}

/// Column names of the input table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    pub group_column: String,
    pub date_column: String,
    pub units_column: Option<String>,
    pub revenue_column: Option<String>,
}

impl InputSchema {
    /// Default export columns for a dimension, with both metrics
    pub fn for_dimension(dimension: &GroupDimension) -> Self {
        Self {
            group_column: dimension.column().to_string(),
            date_column: "MonthYear".to_string(),
            units_column: Some(Metric::Units.default_column().to_string()),
            revenue_column: Some(Metric::Revenue.default_column().to_string()),
        }
    }

    /// Keep only the metric columns in `metrics`
    pub fn restricted_to(mut self, metrics: &[Metric]) -> Self {
        if !metrics.contains(&Metric::Units) {
            self.units_column = None;
        }
        if !metrics.contains(&Metric::Revenue) {
            self.revenue_column = None;
        }
        self
    }

    /// Drop the metric columns `df` does not have
    pub fn available_in(mut self, df: &DataFrame) -> Self {
        let names = df.get_column_names();
        if let Some(name) = &self.units_column {
            if !names.contains(&name.as_str()) {
                debug!(column = %name, "Units column absent, skipping the metric");
                self.units_column = None;
            }
        }
        if let Some(name) = &self.revenue_column {
            if !names.contains(&name.as_str()) {
                debug!(column = %name, "Revenue column absent, skipping the metric");
                self.revenue_column = None;
            }
        }
        self
    }

    /// Column for `metric`, if the schema reads it
    pub fn metric_column(&self, metric: Metric) -> Option<&str> {
        match metric {
            Metric::Units => self.units_column.as_deref(),
            Metric::Revenue => self.revenue_column.as_deref(),
        }
    }

    /// Metrics the schema reads
    pub fn metrics(&self) -> Vec<Metric> {
        [Metric::Units, Metric::Revenue]
            .into_iter()
            .filter(|m| self.metric_column(*m).is_some())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.metrics().is_empty() {
            return Err(ForecastError::Configuration(
                "Input schema names no metric column".to_string(),
            ));
        }
        Ok(())
    }
}

/// One row of the input table
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub group_key: String,
    pub date: NaiveDate,
    pub units: Option<f64>,
    pub revenue: Option<f64>,
}

impl RawObservation {
    /// Value of `metric`, `None` when missing or non-numeric
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Units => self.units,
            Metric::Revenue => self.revenue,
        }
    }
}

/// All observations of a run, in input order
#[derive(Debug, Clone, Default)]
pub struct SalesTable {
    observations: Vec<RawObservation>,
    metrics: Vec<Metric>,
    dropped_rows: usize,
}

impl SalesTable {
    /// Create a table from observations that carry `metrics`
    pub fn new(observations: Vec<RawObservation>, metrics: Vec<Metric>) -> Self {
        Self {
            observations,
            metrics,
            dropped_rows: 0,
        }
    }

    /// Observations in input order
    pub fn observations(&self) -> &[RawObservation] {
        &self.observations
    }

    /// Rows skipped at load time (no group key or no parsable month)
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Whether the table was loaded with a column for `metric`
    pub fn has_metric(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }

    /// Number of loaded rows
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct group keys in order of first appearance
    pub fn group_keys(&self) -> Vec<String> {
        self.groups().into_iter().map(|(key, _)| key).collect()
    }

    /// Observations partitioned by group key, groups in order of first appearance
    pub fn groups(&self) -> Vec<(String, Vec<&RawObservation>)> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(String, Vec<&RawObservation>)> = Vec::new();

        for obs in &self.observations {
            match index.get(obs.group_key.as_str()) {
                Some(&i) => groups[i].1.push(obs),
                None => {
                    index.insert(obs.group_key.as_str(), groups.len());
                    groups.push((obs.group_key.clone(), vec![obs]));
                }
            }
        }

        groups
    }
}

/// Data loader for sales tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a sales table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, schema: &InputSchema) -> Result<SalesTable> {
        Self::from_dataframe(&Self::read_csv(path)?, schema)
    }

    /// Read a CSV file with every column as text
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let file = File::open(path)?;
        // parsing is done per cell in `from_dataframe`
        let df = CsvReader::new(file)
            .infer_schema(Some(0))
            .has_header(true)
            .finish()?;
        Ok(df)
    }

    /// Build a sales table from an existing DataFrame
    pub fn from_dataframe(df: &DataFrame, schema: &InputSchema) -> Result<SalesTable> {
        schema.validate()?;

        let groups = text_column(df, &schema.group_column)?;
        let dates = text_column(df, &schema.date_column)?;
        let units = match &schema.units_column {
            Some(name) => Some(text_column(df, name)?),
            None => None,
        };
        let revenue = match &schema.revenue_column {
            Some(name) => Some(text_column(df, name)?),
            None => None,
        };

        let mut observations = Vec::with_capacity(df.height());
        let mut dropped_rows = 0;

        for row in 0..df.height() {
            let group_key = match groups[row].as_deref() {
                Some(key) if !key.is_empty() => key.to_string(),
                _ => {
                    debug!(row, "Dropping row without a group key");
                    dropped_rows += 1;
                    continue;
                }
            };

            let date = match dates[row].as_deref().and_then(parse_month) {
                Some(date) => date,
                None => {
                    warn!(
                        row,
                        group = %group_key,
                        value = ?dates[row],
                        "Dropping row with an unparsable month"
                    );
                    dropped_rows += 1;
                    continue;
                }
            };

            let cell = |column: &Option<Vec<Option<String>>>| {
                column
                    .as_ref()
                    .and_then(|values| values[row].as_deref())
                    .and_then(parse_metric)
            };

            observations.push(RawObservation {
                group_key,
                date,
                units: cell(&units),
                revenue: cell(&revenue),
            });
        }

        Ok(SalesTable {
            observations,
            metrics: schema.metrics(),
            dropped_rows,
        })
    }
}

/// Read a column as optional trimmed strings, whatever its dtype
fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name).map_err(|_| {
        ForecastError::Configuration(format!("Required column '{}' not found in input", name))
    })?;
    let as_text = column.cast(&DataType::Utf8)?;
    let values = as_text
        .utf8()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect();
    Ok(values)
}

/// Parse a month cell into the first day of that month.
///
/// Accepts full dates (`2023-04-17`, `04/17/2023`, with or without a time)
/// and month-only forms (`2023-04`, `Apr-2023`, `April 2023`).
pub fn parse_month(text: &str) -> Option<NaiveDate> {
    const FULL_DATE: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
    const MONTH_ONLY: [&str; 6] = ["%Y-%m", "%Y/%m", "%b-%Y", "%B-%Y", "%b %Y", "%B %Y"];

    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    // drop a time part: "2023-04-01 00:00:00" or "2023-04-01T00:00:00"
    let date_part = text
        .split(|c| c == ' ' || c == 'T')
        .next()
        .filter(|head| head.len() >= 8 && head.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .unwrap_or(text);

    let parsed = FULL_DATE
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .or_else(|| {
            MONTH_ONLY.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(&format!("1 {}", text), &format!("%d {}", fmt)).ok()
            })
        })?;

    crate::normalize::month_start(parsed)
}

/// Parse a metric cell; anything that is not a finite number is missing.
pub fn parse_metric(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case("2023-04-17", date(2023, 4, 1))]
    #[case("2023-04-01 00:00:00", date(2023, 4, 1))]
    #[case("2023-04-01T00:00:00", date(2023, 4, 1))]
    #[case("04/17/2023", date(2023, 4, 1))]
    #[case("2023-04", date(2023, 4, 1))]
    #[case("Apr-2023", date(2023, 4, 1))]
    #[case("April 2023", date(2023, 4, 1))]
    #[case(" Dec-2021 ", date(2021, 12, 1))]
    fn test_parse_month(#[case] text: &str, #[case] expected: NaiveDate) {
        assert_eq!(parse_month(text), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("not a date")]
    #[case("2023-13-01")]
    fn test_parse_month_rejects(#[case] text: &str) {
        assert_eq!(parse_month(text), None);
    }

    #[rstest]
    #[case("12", Some(12.0))]
    #[case(" 3.5 ", Some(3.5))]
    #[case("-4", Some(-4.0))]
    #[case("", None)]
    #[case("n/a", None)]
    #[case("NaN", None)]
    #[case("1,200", None)]
    fn test_parse_metric(#[case] text: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_metric(text), expected);
    }

    #[test]
    fn test_groups_keep_first_appearance_order() {
        let obs = |key: &str, m: u32| RawObservation {
            group_key: key.to_string(),
            date: date(2023, m, 1),
            units: Some(1.0),
            revenue: None,
        };
        let table = SalesTable::new(
            vec![obs("b", 1), obs("a", 1), obs("b", 2), obs("c", 1), obs("a", 2)],
            vec![Metric::Units],
        );

        assert_eq!(table.group_keys(), vec!["b", "a", "c"]);
        let groups = table.groups();
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[2].1.len(), 1);
        assert!(table.has_metric(Metric::Units));
        assert!(!table.has_metric(Metric::Revenue));
    }

    #[test]
    fn test_from_dataframe() {
        let df = df!(
            "Dealer_ID" => &["D1", "D1", "", "D2"],
            "MonthYear" => &["2023-01-01", "2023-02-01", "2023-01-01", "garbage"],
            "Sum(Units_Sold)" => &["10", "oops", "4", "7"]
        )
        .unwrap();
        let schema =
            InputSchema::for_dimension(&GroupDimension::Dealer).restricted_to(&[Metric::Units]);

        let table = DataLoader::from_dataframe(&df, &schema).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.dropped_rows(), 2);
        assert_eq!(table.observations()[0].units, Some(10.0));
        assert_eq!(table.observations()[1].units, None);
    }

    #[test]
    fn test_schema_keeps_available_metrics() {
        let df = df!(
            "Dealer_ID" => &["D1"],
            "MonthYear" => &["2023-01-01"],
            "Sum(Units_Sold)" => &["3"]
        )
        .unwrap();
        let schema = InputSchema::for_dimension(&GroupDimension::Dealer).available_in(&df);

        assert_eq!(schema.metrics(), vec![Metric::Units]);
        let table = DataLoader::from_dataframe(&df, &schema).unwrap();
        assert_eq!(table.observations()[0].units, Some(3.0));
    }

    #[test]
    fn test_no_metric_column_available() {
        let df = df!(
            "Dealer_ID" => &["D1"],
            "MonthYear" => &["2023-01-01"]
        )
        .unwrap();
        let schema = InputSchema::for_dimension(&GroupDimension::Dealer).available_in(&df);

        assert!(schema.metrics().is_empty());
        assert!(matches!(
            DataLoader::from_dataframe(&df, &schema),
            Err(ForecastError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_column_is_configuration_error() {
        let df = df!(
            "State" => &["CA"],
            "MonthYear" => &["2023-01-01"]
        )
        .unwrap();
        let schema = InputSchema::for_dimension(&GroupDimension::State);

        assert!(matches!(
            DataLoader::from_dataframe(&df, &schema),
            Err(ForecastError::Configuration(_))
        ));
    }
}

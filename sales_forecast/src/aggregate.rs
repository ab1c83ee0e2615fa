//! Ordering and flattening of pipeline results for reporting

use crate::data::Metric;
use crate::models::ForecastResult;
use crate::pipeline::{FailureReason, PipelineOutcome};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pipeline results in group order
#[derive(Debug, Clone)]
pub struct AggregatedForecasts {
    pub metric: Metric,
    pub forecasts: Vec<(String, ForecastResult)>,
    pub failures: Vec<(String, FailureReason)>,
}

/// One forecast month of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub period: NaiveDate,
    pub forecast: f64,
    pub lower: f64,
    pub upper: f64,
    pub group_key: String,
}

/// Whether a combined row is history or forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    Observed,
    Forecast,
}

/// One month of history or forecast for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRow {
    pub group_key: String,
    pub period: NaiveDate,
    pub value: f64,
    pub kind: RowKind,
}

/// Reshape an outcome into group-ordered lists
pub fn aggregate(mut outcome: PipelineOutcome) -> AggregatedForecasts {
    let mut forecasts = Vec::with_capacity(outcome.succeeded.len());
    let mut failures = Vec::with_capacity(outcome.failed.len());

    for key in &outcome.group_order {
        if let Some(result) = outcome.succeeded.remove(key) {
            forecasts.push((key.clone(), result));
        } else if let Some(reason) = outcome.failed.remove(key) {
            failures.push((key.clone(), reason));
        }
    }

    AggregatedForecasts {
        metric: outcome.metric,
        forecasts,
        failures,
    }
}

impl AggregatedForecasts {
    /// Number of forecast groups
    pub fn success_count(&self) -> usize {
        self.forecasts.len()
    }

    /// Number of skipped groups
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Forecast rows of every group, groups in order
    pub fn report_rows(&self) -> Vec<ReportRow> {
        self.forecasts
            .iter()
            .flat_map(|(key, result)| group_rows(key, result))
            .collect()
    }

    /// History followed by forecast for every group
    pub fn combined_rows(&self) -> Vec<CombinedRow> {
        let mut rows = Vec::new();
        for (key, result) in &self.forecasts {
            rows.extend(result.history.iter().map(|(period, value)| CombinedRow {
                group_key: key.clone(),
                period,
                value,
                kind: RowKind::Observed,
            }));
            rows.extend(result.points.iter().map(|p| CombinedRow {
                group_key: key.clone(),
                period: p.period,
                value: p.point_estimate,
                kind: RowKind::Forecast,
            }));
        }
        rows
    }
}

/// Forecast rows of one group
pub fn group_rows(group_key: &str, result: &ForecastResult) -> Vec<ReportRow> {
    result
        .points
        .iter()
        .map(|p| ReportRow {
            period: p.period,
            forecast: p.point_estimate,
            lower: p.lower_bound,
            upper: p.upper_bound,
            group_key: group_key.to_string(),
        })
        .collect()
}

//! Monthly series normalization
//!
//! Raw observations arrive irregularly: several rows may fall in one month,
//! some months have no row at all, and metric cells can be missing. The
//! normalizer turns one group's rows into a gap-free monthly series.

use crate::data::{Metric, RawObservation};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

/// `date` shifted by `months` calendar months
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// A metric on a contiguous monthly grid.
///
/// Periods are month starts, strictly increasing by one month, and there is
/// at least one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSeries {
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl NormalizedSeries {
    /// Build a series starting at `start`, one value per month
    pub fn from_values(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::InsufficientData(
                "A series needs at least one value".to_string(),
            ));
        }
        let start = month_start(start)
            .ok_or_else(|| ForecastError::DataError(format!("Invalid start month {}", start)))?;
        let periods = (0..values.len() as u32)
            .map(|i| {
                add_months(start, i).ok_or_else(|| {
                    ForecastError::DataError(format!("Month index overflow after {}", start))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { periods, values })
    }

    /// Month starts of the series
    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    /// Values, one per period
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of months
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Earliest month
    pub fn first_period(&self) -> NaiveDate {
        self.periods[0]
    }

    /// Latest month
    pub fn last_period(&self) -> NaiveDate {
        self.periods[self.periods.len() - 1]
    }

    /// The `count` months following the last period
    pub fn next_periods(&self, count: usize) -> Result<Vec<NaiveDate>> {
        let last = self.last_period();
        (1..=count as u32)
            .map(|i| {
                add_months(last, i).ok_or_else(|| {
                    ForecastError::DataError(format!("Month index overflow after {}", last))
                })
            })
            .collect()
    }

    /// Iterate `(period, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.periods.iter().copied().zip(self.values.iter().copied())
    }
}

/// Aligns one group's observations of a metric to a monthly grid
#[derive(Debug, Clone, Copy)]
pub struct SeriesNormalizer {
    metric: Metric,
}

impl SeriesNormalizer {
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }

    /// Metric read from each observation
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Normalize the rows of one group.
    ///
    /// Values within a month are summed, months without a numeric value are
    /// 0.0, and the range runs from the earliest to the latest dated row.
    pub fn normalize(&self, group_key: &str, observations: &[&RawObservation]) -> Result<NormalizedSeries> {
        let points = observations
            .iter()
            .map(|obs| (obs.date, obs.value(self.metric)));
        normalize_points(group_key, points)
    }

    /// Normalize an existing series; a normalized series comes back unchanged
    pub fn renormalize(&self, group_key: &str, series: &NormalizedSeries) -> Result<NormalizedSeries> {
        normalize_points(group_key, series.iter().map(|(p, v)| (p, Some(v))))
    }
}

fn normalize_points<I>(group_key: &str, points: I) -> Result<NormalizedSeries>
where
    I: Iterator<Item = (NaiveDate, Option<f64>)>,
{
    let mut months: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut valid = 0usize;

    for (date, value) in points {
        let month = month_start(date)
            .ok_or_else(|| ForecastError::DataError(format!("Invalid date {}", date)))?;
        let slot = months.entry(month).or_insert(0.0);
        if let Some(v) = value.filter(|v| v.is_finite()) {
            *slot += v;
            valid += 1;
        }
    }

    if valid == 0 {
        return Err(ForecastError::InsufficientData(format!(
            "Group '{}' has no numeric observations",
            group_key
        )));
    }

    let (first, last) = match (months.keys().next(), months.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(ForecastError::InsufficientData(format!(
                "Group '{}' is empty",
                group_key
            )))
        }
    };

    let mut values = Vec::new();
    let mut month = first;
    while month <= last {
        values.push(months.get(&month).copied().unwrap_or(0.0));
        month = add_months(month, 1)
            .ok_or_else(|| ForecastError::DataError(format!("Month index overflow after {}", month)))?;
    }

    NormalizedSeries::from_values(first, values)
}

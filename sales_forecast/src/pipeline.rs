//! Grouped forecasting pipeline
//!
//! Every group is normalized and forecast on its own. A failing group is
//! recorded with its reason and never stops the others; only configuration
//! problems abort a run.

use crate::config::ForecastConfig;
use crate::data::{Metric, RawObservation, SalesTable};
use crate::error::{ForecastError, Result};
use crate::models::seasonal::SeasonalForecaster;
use crate::models::ForecastResult;
use crate::normalize::SeriesNormalizer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared stop flag; once cancelled, groups that have not started are skipped
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop starting new groups
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called on any clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Category of a per-group failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InsufficientData,
    ModelFit,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InsufficientData => write!(f, "insufficient data"),
            FailureKind::ModelFit => write!(f, "model fit"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a group has no forecast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an error raised while processing one group
    pub fn from_error(err: &ForecastError) -> Self {
        let kind = match err {
            ForecastError::InsufficientData(_) => FailureKind::InsufficientData,
            _ => FailureKind::ModelFit,
        };
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of a pipeline run.
///
/// Every input group key is in exactly one of `succeeded` and `failed`;
/// `group_order` lists them in order of first appearance.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub metric: Metric,
    pub succeeded: HashMap<String, ForecastResult>,
    pub failed: HashMap<String, FailureReason>,
    pub group_order: Vec<String>,
}

impl PipelineOutcome {
    /// An outcome with no groups
    pub fn empty(metric: Metric) -> Self {
        Self {
            metric,
            succeeded: HashMap::new(),
            failed: HashMap::new(),
            group_order: Vec::new(),
        }
    }

    /// Number of distinct input groups
    pub fn group_count(&self) -> usize {
        self.group_order.len()
    }

    /// Whether succeeded and failed partition the groups
    pub fn is_partition(&self) -> bool {
        self.succeeded.len() + self.failed.len() == self.group_order.len()
            && self
                .group_order
                .iter()
                .all(|k| self.succeeded.contains_key(k) != self.failed.contains_key(k))
    }

    /// Failure count per kind
    pub fn failure_counts(&self) -> HashMap<FailureKind, usize> {
        let mut counts = HashMap::new();
        for reason in self.failed.values() {
            *counts.entry(reason.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Runs normalization and forecasting for every group of a table
#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    config: ForecastConfig,
    metric: Metric,
    normalizer: SeriesNormalizer,
    forecaster: SeasonalForecaster,
    cancellation: CancellationToken,
}

impl ForecastPipeline {
    /// Create a pipeline, validating `config` first
    pub fn new(config: ForecastConfig, metric: Metric) -> Result<Self> {
        config.validate()?;
        let forecaster = SeasonalForecaster::new(&config, metric);

        Ok(Self {
            normalizer: SeriesNormalizer::new(metric),
            forecaster,
            config,
            metric,
            cancellation: CancellationToken::new(),
        })
    }

    /// Use an externally owned stop flag
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Token that cancels this pipeline's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Validated run settings
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Normalize and forecast a single group
    pub fn forecast_group(
        &self,
        group_key: &str,
        observations: &[&RawObservation],
    ) -> std::result::Result<ForecastResult, FailureReason> {
        let started = Instant::now();

        let series = self
            .normalizer
            .normalize(group_key, observations)
            .map_err(|e| FailureReason::from_error(&e))?;

        let min_len = self.config.min_observations();
        if series.len() < min_len {
            return Err(FailureReason::new(
                FailureKind::InsufficientData,
                format!(
                    "{} monthly observations, at least {} required",
                    series.len(),
                    min_len
                ),
            ));
        }

        let result = self
            .forecaster
            .forecast(group_key, &series)
            .map_err(|e| FailureReason::from_error(&e))?;

        debug!(
            group = group_key,
            n_obs = series.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Group forecast"
        );
        Ok(result)
    }

    /// Forecast every group of `table`
    pub fn run(&self, table: &SalesTable) -> Result<PipelineOutcome> {
        if !table.has_metric(self.metric) {
            return Err(ForecastError::Configuration(format!(
                "Input table has no column for metric {}",
                self.metric
            )));
        }

        let groups = table.groups();
        info!(
            metric = %self.metric,
            groups = groups.len(),
            rows = table.len(),
            "Starting forecast run"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers.unwrap_or(0))
            .build()
            .map_err(|e| ForecastError::WorkerPool(e.to_string()))?;

        let results: Vec<std::result::Result<ForecastResult, FailureReason>> = pool.install(|| {
            groups
                .par_iter()
                .map(|(key, observations)| self.run_group(key, observations))
                .collect()
        });

        let mut outcome = PipelineOutcome::empty(self.metric);
        for ((key, _), result) in groups.into_iter().zip(results) {
            match result {
                Ok(forecast) => {
                    outcome.succeeded.insert(key.clone(), forecast);
                }
                Err(reason) => {
                    warn!(group = %key, kind = %reason.kind, "Skipping group: {}", reason.message);
                    outcome.failed.insert(key.clone(), reason);
                }
            }
            outcome.group_order.push(key);
        }

        info!(
            metric = %self.metric,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Forecast run finished"
        );
        Ok(outcome)
    }

    fn run_group(
        &self,
        key: &str,
        observations: &[&RawObservation],
    ) -> std::result::Result<ForecastResult, FailureReason> {
        if self.cancellation.is_cancelled() {
            return Err(FailureReason::new(
                FailureKind::Cancelled,
                "run cancelled before this group started",
            ));
        }

        catch_unwind(AssertUnwindSafe(|| self.forecast_group(key, observations))).unwrap_or_else(
            |payload| {
                Err(FailureReason::new(
                    FailureKind::ModelFit,
                    format!("panic while fitting: {}", panic_message(payload.as_ref())),
                ))
            },
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

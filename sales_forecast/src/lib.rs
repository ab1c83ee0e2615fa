//! # Sales Forecast
//!
//! Grouped seasonal forecasting of monthly sales.
//!
//! ## Features
//!
//! - CSV loading of dealer, state or model level sales exports
//! - Normalization of irregular rows onto a gap-free monthly grid
//! - SARIMA(p,d,q)(P,D,Q,s) fitted by exact maximum likelihood (Kalman filter)
//! - Forecasts with prediction intervals for every group, run in parallel
//! - Per-group failures recorded with a reason instead of aborting the run
//! - CSV report sections and a JSON run summary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sales_forecast::aggregate::aggregate;
//! use sales_forecast::data::{DataLoader, GroupDimension, InputSchema, Metric};
//! use sales_forecast::report::ReportWriter;
//! use sales_forecast::{ForecastConfig, ForecastPipeline};
//!
//! # fn main() -> sales_forecast::error::Result<()> {
//! let schema = InputSchema::for_dimension(&GroupDimension::State);
//! let table = DataLoader::from_csv("sales_by_state.csv", &schema)?;
//!
//! let pipeline = ForecastPipeline::new(ForecastConfig::default(), Metric::Revenue)?;
//! let outcome = pipeline.run(&table)?;
//!
//! let forecasts = aggregate(outcome);
//! for (group, reason) in &forecasts.failures {
//!     println!("skipped {}: {}", group, reason);
//! }
//! ReportWriter::new("reports", "Region").write(&forecasts)?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use crate::config::{ForecastConfig, ModelOrder, SeasonalOrder};
pub use crate::data::{DataLoader, Metric, SalesTable};
pub use crate::error::ForecastError;
pub use crate::models::{ForecastPoint, ForecastResult};
pub use crate::normalize::NormalizedSeries;
pub use crate::pipeline::{CancellationToken, FailureKind, FailureReason, ForecastPipeline, PipelineOutcome};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Command line forecasting of monthly sales per dealer, state or model.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sales_forecast::aggregate::aggregate;
use sales_forecast::data::{DataLoader, GroupDimension, InputSchema, Metric};
use sales_forecast::report::ReportWriter;
use sales_forecast::{ForecastConfig, ForecastPipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DimensionArg {
    Dealer,
    State,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    Units,
    Revenue,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Units => Metric::Units,
            MetricArg::Revenue => Metric::Revenue,
        }
    }
}

#[derive(Parser)]
#[command(name = "sales_forecast")]
#[command(author, version)]
#[command(about = "Forecast monthly units and revenue per group with a seasonal ARIMA model")]
#[command(long_about = "Forecast monthly units and revenue per group with a seasonal ARIMA model.

EXAMPLES:
  # Revenue and units per state, reports in ./reports
  sales_forecast --input sales_by_state.csv --dimension state

  # Units per dealer only, with a 6 month horizon from a config file
  sales_forecast --input dealers.csv --dimension dealer --metric units --config run.json

  # Custom group column
  sales_forecast --input export.csv --group-column Region --metric revenue")]
struct Cli {
    /// Input CSV file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Grouping dimension, selects the default group column
    #[arg(short, long, value_enum, default_value = "dealer")]
    dimension: DimensionArg,

    /// Group column name, overrides the dimension default
    #[arg(long, value_name = "COLUMN")]
    group_column: Option<String>,

    /// Month column name
    #[arg(long, default_value = "MonthYear", value_name = "COLUMN")]
    date_column: String,

    /// Units column name
    #[arg(long, value_name = "COLUMN")]
    units_column: Option<String>,

    /// Revenue column name
    #[arg(long, value_name = "COLUMN")]
    revenue_column: Option<String>,

    /// Metric to forecast; repeat for several (default: every metric column present)
    #[arg(short, long, value_enum)]
    metric: Vec<MetricArg>,

    /// Output directory for report sections and summaries
    #[arg(short, long, default_value = "reports", value_name = "DIR")]
    output: PathBuf,

    /// JSON file with forecast settings
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Forecast horizon in months, overrides the config file
    #[arg(long)]
    horizon: Option<usize>,

    /// Worker threads (default: all CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let mut config = match &cli.config {
        Some(path) => ForecastConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ForecastConfig::default(),
    };
    if let Some(horizon) = cli.horizon {
        config.horizon = horizon;
    }
    if cli.workers.is_some() {
        config.max_workers = cli.workers;
    }

    let dimension = match (&cli.group_column, cli.dimension) {
        (Some(column), _) => GroupDimension::Column(column.clone()),
        (None, DimensionArg::Dealer) => GroupDimension::Dealer,
        (None, DimensionArg::State) => GroupDimension::State,
        (None, DimensionArg::Model) => GroupDimension::Model,
    };

    let mut schema = InputSchema::for_dimension(&dimension);
    schema.date_column = cli.date_column.clone();
    if let Some(column) = &cli.units_column {
        schema.units_column = Some(column.clone());
    }
    if let Some(column) = &cli.revenue_column {
        schema.revenue_column = Some(column.clone());
    }
    let df = DataLoader::read_csv(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let schema = if cli.metric.is_empty() {
        schema.available_in(&df)
    } else {
        let requested: Vec<Metric> = cli.metric.iter().map(|m| Metric::from(*m)).collect();
        schema.restricted_to(&requested)
    };
    // revenue first, as in the by-state reports
    let metrics: Vec<Metric> = [Metric::Revenue, Metric::Units]
        .into_iter()
        .filter(|m| schema.metric_column(*m).is_some())
        .collect();

    let table = DataLoader::from_dataframe(&df, &schema)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    info!(
        rows = table.len(),
        dropped = table.dropped_rows(),
        groups = table.group_keys().len(),
        "Loaded input"
    );

    let writer = ReportWriter::new(&cli.output, schema.group_column.clone());
    for metric in metrics {
        let pipeline = ForecastPipeline::new(config.clone(), metric)
            .context("Invalid forecast configuration")?;
        let outcome = pipeline
            .run(&table)
            .with_context(|| format!("Forecast run for {} failed", metric))?;

        let forecasts = aggregate(outcome);
        let summary = writer
            .write(&forecasts)
            .with_context(|| format!("Failed to write {} reports", metric))?;

        println!(
            "{}: {} groups forecast, {} skipped -> {}",
            metric,
            summary.succeeded,
            summary.failed,
            writer.metric_dir(metric).display()
        );
        for skipped in &summary.skipped {
            println!("  skipped {}: {} ({})", skipped.group_key, skipped.reason, skipped.kind);
        }
    }

    Ok(())
}

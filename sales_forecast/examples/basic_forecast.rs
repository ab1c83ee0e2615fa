use chrono::NaiveDate;
use sales_forecast::aggregate::aggregate;
use sales_forecast::data::{Metric, RawObservation, SalesTable};
use sales_forecast::normalize::add_months;
use sales_forecast::{ForecastConfig, ForecastPipeline};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Sales Forecast: Basic Forecasting Example");
    println!("=========================================\n");

    // Create sample data
    println!("Creating sample data...");
    let table = create_sample_table();
    println!(
        "Sample data created: {} rows across {} dealers\n",
        table.len(),
        table.group_keys().len()
    );

    // Forecast units for every dealer
    println!("Forecasting units...");
    let pipeline = ForecastPipeline::new(ForecastConfig::default(), Metric::Units)?;
    let forecasts = aggregate(pipeline.run(&table)?);

    for (dealer, result) in &forecasts.forecasts {
        println!(
            "\n{} ({}, AIC {:?}):",
            dealer, result.diagnostics.model, result.diagnostics.aic
        );
        for point in &result.points {
            println!(
                "  {}: {:>8.1}  [{:>8.1}, {:>8.1}]",
                point.period.format("%Y-%m"),
                point.point_estimate,
                point.lower_bound,
                point.upper_bound
            );
        }
    }

    println!("\nSkipped dealers:");
    for (dealer, reason) in &forecasts.failures {
        println!("  {}: {}", dealer, reason);
    }

    Ok(())
}

/// Three years of monthly sales for two dealers plus one newcomer
fn create_sample_table() -> SalesTable {
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let mut rows = Vec::new();

    for (dealer, base, months) in [("D-100", 120.0, 36), ("D-200", 45.0, 36), ("D-300", 10.0, 5)] {
        for t in 0..months {
            let season = 15.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin();
            // deterministic wobble so the fit has something to estimate
            let wobble = 4.0 * ((t * 7919) % 13) as f64 / 13.0 - 2.0;
            rows.push(RawObservation {
                group_key: dealer.to_string(),
                date: add_months(start, t).unwrap(),
                units: Some(base + 0.8 * t as f64 + season + wobble),
                revenue: None,
            });
        }
    }

    SalesTable::new(rows, vec![Metric::Units])
}

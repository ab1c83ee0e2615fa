use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use sales_forecast::aggregate::aggregate;
use sales_forecast::data::Metric;
use sales_forecast::models::{FitDiagnostics, ForecastPoint, ForecastResult};
use sales_forecast::normalize::NormalizedSeries;
use sales_forecast::pipeline::{FailureKind, FailureReason, PipelineOutcome};
use sales_forecast::report::{ReportWriter, RunSummary};
use std::fs;
use tempfile::tempdir;

fn result(key: &str, base: f64) -> ForecastResult {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let history = NormalizedSeries::from_values(start, vec![base, base + 1.0, base + 2.0]).unwrap();
    let points = (0..2)
        .map(|h| ForecastPoint {
            period: NaiveDate::from_ymd_opt(2023, 4 + h, 1).unwrap(),
            point_estimate: base + 3.0 + h as f64,
            lower_bound: base + 2.0 + h as f64,
            upper_bound: base + 4.0 + h as f64,
        })
        .collect();
    let diagnostics = FitDiagnostics {
        model: "SARIMA(0,1,0)(0,0,0,0)".to_string(),
        log_likelihood: None,
        aic: None,
        sigma2: 0.0,
        iterations: 0,
        termination: None,
        n_obs: 3,
    };
    ForecastResult::new(key, Metric::Revenue, points, history, diagnostics).unwrap()
}

fn outcome() -> PipelineOutcome {
    let long_a = "Pacific Northwest Wholesale Group East";
    let long_b = "Pacific Northwest Wholesale Group West";
    let mut outcome = PipelineOutcome::empty(Metric::Revenue);
    outcome.group_order = vec![long_a.to_string(), "NV".to_string(), long_b.to_string()];
    outcome.succeeded.insert(long_a.to_string(), result(long_a, 10.0));
    outcome.succeeded.insert(long_b.to_string(), result(long_b, 20.0));
    outcome.failed.insert(
        "NV".to_string(),
        FailureReason::new(FailureKind::ModelFit, "did not converge"),
    );
    outcome
}

#[test]
fn test_sections_and_summary_are_written() {
    let dir = tempdir().unwrap();
    let writer = ReportWriter::new(dir.path(), "Region");

    let summary = writer.write(&aggregate(outcome())).unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.sections[0].section, "Pacific Northwest Wholesale Gro");
    assert_eq!(summary.sections[1].section, "Pacific Northwest Wholesale G~2");
    assert_eq!(summary.skipped[0].group_key, "NV");
    assert_eq!(summary.skipped[0].kind, FailureKind::ModelFit);

    let metric_dir = dir.path().join("revenue");
    let first = fs::read_to_string(metric_dir.join(&summary.sections[0].file)).unwrap();
    let lines: Vec<&str> = first.lines().collect();
    assert_eq!(lines[0], "Forecast_Month,Forecast,Lower_CI,Upper_CI,Region");
    assert_eq!(
        lines[1],
        "2023-04-01,13,12,14,Pacific Northwest Wholesale Group East"
    );
    assert_eq!(lines.len(), 3);

    let second = fs::read_to_string(metric_dir.join(&summary.sections[1].file)).unwrap();
    assert!(second.contains("Pacific Northwest Wholesale Group West"));
}

#[test]
fn test_group_named_combined_keeps_its_section() {
    let dir = tempdir().unwrap();
    let writer = ReportWriter::new(dir.path(), "Dealer_ID");
    let mut outcome = PipelineOutcome::empty(Metric::Revenue);
    outcome.group_order = vec!["combined".to_string()];
    outcome.succeeded.insert("combined".to_string(), result("combined", 5.0));

    let summary = writer.write(&aggregate(outcome)).unwrap();
    assert_eq!(summary.sections[0].file, "combined~2.csv");

    let metric_dir = dir.path().join("revenue");
    let section = fs::read_to_string(metric_dir.join("combined~2.csv")).unwrap();
    assert!(section.starts_with("Forecast_Month,Forecast,Lower_CI,Upper_CI,Dealer_ID"));
    let combined = fs::read_to_string(metric_dir.join("combined.csv")).unwrap();
    assert!(combined.starts_with("Dealer_ID,Month,Value,Kind"));
}

#[test]
fn test_summary_round_trips_through_json() {
    let dir = tempdir().unwrap();
    let writer = ReportWriter::new(dir.path(), "Region");
    let summary = writer.write(&aggregate(outcome())).unwrap();

    let text = fs::read_to_string(dir.path().join("revenue").join("summary.json")).unwrap();
    let parsed: RunSummary = serde_json::from_str(&text).unwrap();

    assert_eq!(parsed, summary);
    assert_eq!(parsed.metric, Metric::Revenue);
}

#[test]
fn test_combined_history_and_forecast() {
    let dir = tempdir().unwrap();
    ReportWriter::new(dir.path(), "Region")
        .write(&aggregate(outcome()))
        .unwrap();

    let text = fs::read_to_string(dir.path().join("revenue").join("combined.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    // header + 2 groups x (3 observed + 2 forecast)
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[0], "Region,Month,Value,Kind");
    assert!(lines[1].ends_with("2023-01-01,10,Observed"));
    assert!(lines[4].ends_with("2023-04-01,13,Forecast"));
}

#[test]
fn test_failed_groups_get_no_section() {
    let dir = tempdir().unwrap();
    let summary = ReportWriter::new(dir.path(), "State")
        .write(&aggregate(outcome()))
        .unwrap();

    let files: Vec<String> = fs::read_dir(dir.path().join("revenue"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();

    assert_eq!(files.len(), summary.sections.len() + 2);
    assert!(!files.iter().any(|f| f.starts_with("NV")));
}

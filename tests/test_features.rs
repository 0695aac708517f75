//! Integration test: feature engineering on synthetic daily series

use chrono::{Duration, NaiveDate, NaiveDateTime};
use flowcast::prelude::*;
use flowcast::timeseries::cyclic;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2018, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

fn series(values: Vec<f64>) -> FlowSeries {
    let timestamps = (0..values.len()).map(|i| start() + Duration::days(i as i64)).collect();
    FlowSeries::new("620883808", "flow", timestamps, values)
}

fn sine_series(n: usize) -> FlowSeries {
    series(
        (0..n)
            .map(|i| 100.0 + 50.0 * (2.0 * std::f64::consts::PI * i as f64 / 365.0).sin())
            .collect(),
    )
}

// ============================================================================
// Table shape
// ============================================================================

#[test]
fn test_no_undefined_values_remain() {
    let table = FeatureBuilder::default().build(&sine_series(400)).unwrap();
    assert_eq!(table.count_missing(), 0, "feature table must not contain NaN");
    assert!(table.target().iter().all(|v| v.is_finite()));
}

#[test]
fn test_default_feature_set() {
    let table = FeatureBuilder::default().build(&sine_series(200)).unwrap();
    assert_eq!(table.n_features(), 23);
    assert_eq!(&table.feature_names()[..5], &["year", "month", "day", "dayofyear", "quarter"]);
    assert!(table.feature_names().contains(&"flow_lag_30".to_string()));
    assert!(table.feature_names().contains(&"flow_rolling_std_30".to_string()));
}

#[test]
fn test_thousand_rows_keep_at_least_940() {
    let table = FeatureBuilder::default().build(&sine_series(1000)).unwrap();
    assert!(table.len() >= 940, "only {} rows survived warm-up", table.len());
    assert_eq!(table.usable_start(), Some(start() + Duration::days(30)));
}

#[test]
fn test_rows_stay_in_time_order() {
    let table = FeatureBuilder::default().build(&sine_series(300)).unwrap();
    assert!(table.timestamps().windows(2).all(|w| w[0] < w[1]));
}

// ============================================================================
// Feature values
// ============================================================================

#[test]
fn test_lag_matches_earlier_value() {
    let n = 200;
    let table = FeatureBuilder::default()
        .build(&series((0..n).map(|i| i as f64).collect()))
        .unwrap();

    for row in table.rows() {
        for k in [1usize, 2, 3, 7, 15, 30] {
            let lag = row.get(&format!("flow_lag_{}", k)).unwrap();
            assert_eq!(lag, row.flow - k as f64, "lag_{} wrong at {}", k, row.timestamp);
        }
    }
}

#[test]
fn test_constant_series_rolling_stats() {
    let c = 5.0;
    let table = FeatureBuilder::default().build(&series(vec![c; 150])).unwrap();

    for w in [3, 7, 15, 30] {
        let mean = table.column(&format!("flow_rolling_mean_{}", w)).unwrap();
        let std = table.column(&format!("flow_rolling_std_{}", w)).unwrap();
        assert!(mean.iter().all(|m| (m - c).abs() < 1e-12), "rolling mean {} not constant", w);
        assert!(std.iter().all(|s| s.abs() < 1e-12), "rolling std {} not zero", w);
    }
}

#[test]
fn test_cyclic_month_continuity() {
    let dist = |a: (f64, f64), b: (f64, f64)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    let jan = cyclic(1.0, 12.0);
    let jun = cyclic(6.0, 12.0);
    let dec = cyclic(12.0, 12.0);

    assert!(dist(jan, dec) < 0.6);
    assert!(dist(jan, dec) < dist(jan, jun));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_wrong_target_label() {
    let s = sine_series(100);
    let renamed = FlowSeries::new(s.site_id(), "caudal", s.timestamps().to_vec(), s.values().to_vec());
    let err = FeatureBuilder::default().build(&renamed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FeatureComputation);
}

#[test]
fn test_series_shorter_than_warmup() {
    let err = FeatureBuilder::default().build(&sine_series(20)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);
}

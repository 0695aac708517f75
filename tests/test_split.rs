//! Integration test: chronological train/test split

use chrono::{Duration, NaiveDate};
use flowcast::prelude::*;

fn table(n: usize) -> FeatureTable {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let timestamps = (0..n).map(|i| start + Duration::days(i as i64)).collect();
    let values = (0..n).map(|i| (i as f64 / 10.0).cos() * 20.0 + 40.0).collect();
    let series = FlowSeries::new("s", "flow", timestamps, values);
    FeatureBuilder::default().build(&series).unwrap()
}

#[test]
fn test_partitions_are_disjoint_exhaustive_and_ordered() {
    let t = table(500);
    for fraction in [0.01, 0.1, 0.25, 0.3, 0.5, 0.75, 0.99] {
        let split = TemporalSplitter::new(fraction).split(&t).unwrap();

        assert_eq!(split.train.len() + split.test.len(), t.len(), "fraction {}", fraction);
        let mut joined = split.train.timestamps().to_vec();
        joined.extend_from_slice(split.test.timestamps());
        assert_eq!(joined, t.timestamps(), "union must equal the input at {}", fraction);

        let max_train = split.train.timestamps().iter().max().unwrap();
        let min_test = split.test.timestamps().iter().min().unwrap();
        assert!(max_train < min_test, "train must precede test at {}", fraction);
        assert_eq!(split.train.feature_names(), split.test.feature_names());
    }
}

#[test]
fn test_default_fraction_holds_out_about_thirty_percent() {
    let t = table(1000);
    let split = TemporalSplitter::default().split(&t).unwrap();
    let share = split.test.len() as f64 / t.len() as f64;
    assert!((share - 0.3).abs() < 0.01, "test share {}", share);
}

#[test]
fn test_zero_and_one_fractions_fail() {
    let t = table(200);
    for fraction in [0.0, 1.0] {
        let err = TemporalSplitter::new(fraction).split(&t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientSplitData);
    }
}

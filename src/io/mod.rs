//! File adapters
//!
//! The pipeline works on in-memory tables only; this module reads series
//! from CSV and writes run artifacts. It is the only place that touches the
//! filesystem or creates directories.

mod artifacts;
mod csv_source;
mod model_store;

pub use artifacts::{write_importance_csv, write_predictions_csv, ArtifactPaths, ArtifactWriter};
pub use csv_source::{parse_timestamp, CsvSeriesSource};
pub use model_store::{load_model, save_model, StoredModel};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::timeseries::FeatureConfig;
    use crate::training::{ForestParams, Trainer};
    use chrono::NaiveDate;
    use ndarray::{Array1, Array2};

    fn stored(features: FeatureConfig) -> StoredModel {
        let names = crate::timeseries::FeatureBuilder::new(features.clone()).feature_names();
        let x = Array2::from_shape_fn((30, names.len()), |(r, c)| (r * (c + 1)) as f64);
        let y = Array1::from_shape_fn(30, |r| r as f64);
        let model = Trainer::new(ForestParams::default().with_n_estimators(3))
            .fit(&x, &y, &names)
            .unwrap();
        let trained_at = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        StoredModel::new("620883808", "flow", features, trained_at, model)
    }

    #[test]
    fn test_model_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.json");
        let features = FeatureConfig::default().with_lags(vec![1]).with_windows(vec![2]);

        save_model(&stored(features.clone()), &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.site_id, "620883808");
        assert_eq!(loaded.features, features);
        assert_eq!(loaded.model.n_train_rows(), 30);
    }

    #[test]
    fn test_inconsistent_model_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut model = stored(FeatureConfig::default().with_lags(vec![1]).with_windows(vec![2]));
        model.features = FeatureConfig::default().with_lags(vec![2]).with_windows(vec![2]);

        save_model(&model, &path).unwrap();
        assert_eq!(load_model(&path).unwrap_err().kind(), ErrorKind::FeatureMismatch);
    }

    #[test]
    fn test_load_missing_model() {
        assert_eq!(load_model("/nonexistent/model.json").unwrap_err().kind(), ErrorKind::Io);
    }
}

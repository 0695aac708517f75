//! CSV-backed series source

use crate::error::{FlowcastError, Result};
use crate::series::{RawObservation, SeriesSource};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads a comma-separated table with a time column and one value column per site.
///
/// The value column is looked up by the site identifier itself, so the
/// retrospective export (`time,620883808`) can be read as-is.
#[derive(Debug, Clone)]
pub struct CsvSeriesSource {
    path: PathBuf,
    time_column: String,
}

impl CsvSeriesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            time_column: "time".to_string(),
        }
    }

    /// Name of the timestamp column (default `time`)
    pub fn with_time_column(mut self, name: impl Into<String>) -> Self {
        self.time_column = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_frame(&self) -> Result<DataFrame> {
        let file = File::open(&self.path).map_err(|e| {
            FlowcastError::DataUnavailable(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            // Whole-file inference: long integer-valued stretches must not pin
            // a discharge column to i64 before the first decimal value appears.
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| FlowcastError::DataError(format!("{}: {}", self.path.display(), e)))
    }

    /// Column names in file order
    pub fn columns(&self) -> Result<Vec<String>> {
        let df = self.read_frame()?;
        Ok(df.get_column_names().into_iter().map(|s| s.to_string()).collect())
    }
}

impl SeriesSource for CsvSeriesSource {
    fn fetch(&self, site_id: &str) -> Result<Vec<RawObservation>> {
        let df = self.read_frame()?;
        if df.height() == 0 {
            return Err(FlowcastError::DataUnavailable(format!(
                "{} contains no rows",
                self.path.display()
            )));
        }

        let missing = |name: &str| {
            FlowcastError::DataUnavailable(format!("{} has no `{}` column", self.path.display(), name))
        };
        let time = df
            .column(&self.time_column)
            .map_err(|_| missing(&self.time_column))?
            .cast(&DataType::String)?;
        let values = df
            .column(site_id)
            .map_err(|_| missing(site_id))?
            .cast(&DataType::Float64)?;

        let mut observations = Vec::with_capacity(df.height());
        let mut skipped = 0usize;
        for (row, (t, v)) in time.str()?.into_iter().zip(values.f64()?.into_iter()).enumerate() {
            match (t, v) {
                (Some(t), Some(v)) => {
                    let timestamp = parse_timestamp(t).ok_or_else(|| {
                        FlowcastError::DataError(format!(
                            "{}: unrecognised timestamp `{}` on row {}",
                            self.path.display(),
                            t,
                            row + 1
                        ))
                    })?;
                    observations.push(RawObservation::new(timestamp, v));
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(site = site_id, skipped, "Skipped rows with an empty time or value");
        }
        if observations.is_empty() {
            return Err(FlowcastError::DataUnavailable(format!(
                "{} has no values for site {}",
                self.path.display(),
                site_id
            )));
        }

        debug!(site = site_id, rows = observations.len(), path = %self.path.display(), "Read CSV series");
        Ok(observations)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (or `T`-separated) and RFC 3339 timestamps
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    fn csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let midnight = NaiveDate::from_ymd_opt(2020, 5, 17).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2020-05-17"), Some(midnight));
        assert_eq!(parse_timestamp("2020-05-17 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2020-05-17T00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2020-05-17T02:00:00+02:00"), Some(midnight));
        assert_eq!(parse_timestamp("17/05/2020"), None);
    }

    #[test]
    fn test_fetch_site_column() {
        let file = csv("time,620883808,other\n2020-01-01,1.5,9\n2020-01-02,,9\n2020-01-03,2.5,9\n");
        let source = CsvSeriesSource::new(file.path());
        let obs = source.fetch("620883808").unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].value, 1.5);
        assert_eq!(obs[1].value, 2.5);
    }

    #[test]
    fn test_integer_prefix_then_decimals() {
        let mut contents = String::from("time,620883808\n");
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        for i in 0..150 {
            let day = start + chrono::Duration::days(i);
            contents.push_str(&format!("{},{}\n", day.format("%Y-%m-%d"), 100 + i));
        }
        contents.push_str("2000-05-30,160.5\n");
        let file = csv(&contents);

        let obs = CsvSeriesSource::new(file.path()).fetch("620883808").unwrap();
        assert_eq!(obs.len(), 151);
        assert_eq!(obs[0].value, 100.0);
        assert_eq!(obs[150].value, 160.5);
    }

    #[test]
    fn test_missing_column_is_unavailable() {
        let file = csv("time,620883808\n2020-01-01,1.5\n");
        let err = CsvSeriesSource::new(file.path()).fetch("123").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = CsvSeriesSource::new("/nonexistent/flow.csv").fetch("1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn test_bad_timestamp() {
        let file = csv("time,7\nyesterday,1.0\n");
        let err = CsvSeriesSource::new(file.path()).fetch("7").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }
}

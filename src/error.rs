//! Error types for the flowcast pipeline

use std::fmt;
use thiserror::Error;

/// Result type alias for flowcast operations
pub type Result<T> = std::result::Result<T, FlowcastError>;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Load,
    Features,
    Split,
    Train,
    Evaluate,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Features => write!(f, "features"),
            Stage::Split => write!(f, "split"),
            Stage::Train => write!(f, "train"),
            Stage::Evaluate => write!(f, "evaluate"),
            Stage::Assemble => write!(f, "assemble"),
        }
    }
}

/// Coarse classification of a failure, independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    DataUnavailable,
    InsufficientData,
    IrregularCadence,
    FeatureComputation,
    InsufficientSplitData,
    Training,
    FeatureMismatch,
    Config,
    Io,
    Serialization,
    Data,
    Shape,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DataUnavailable => "DataUnavailable",
            ErrorKind::InsufficientData => "InsufficientData",
            ErrorKind::IrregularCadence => "IrregularCadence",
            ErrorKind::FeatureComputation => "FeatureComputationError",
            ErrorKind::InsufficientSplitData => "InsufficientSplitData",
            ErrorKind::Training => "TrainingError",
            ErrorKind::FeatureMismatch => "FeatureMismatchError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Io => "IoError",
            ErrorKind::Serialization => "SerializationError",
            ErrorKind::Data => "DataError",
            ErrorKind::Shape => "ShapeError",
        };
        f.write_str(name)
    }
}

/// Main error type for the flowcast pipeline
#[derive(Error, Debug)]
pub enum FlowcastError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Irregular cadence: {0}")]
    IrregularCadence(String),

    #[error("Feature computation error: {0}")]
    FeatureComputation(String),

    #[error("Insufficient split data: {0}")]
    InsufficientSplitData(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Feature mismatch: model expects {expected:?}, got {actual:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<FlowcastError>,
    },
}

impl FlowcastError {
    /// Attribute this error to a pipeline stage. Already attributed errors keep
    /// their original stage.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            FlowcastError::Stage { .. } => self,
            other => FlowcastError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was attributed to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            FlowcastError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Kind of the underlying failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowcastError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            FlowcastError::InsufficientData { .. } => ErrorKind::InsufficientData,
            FlowcastError::IrregularCadence(_) => ErrorKind::IrregularCadence,
            FlowcastError::FeatureComputation(_) => ErrorKind::FeatureComputation,
            FlowcastError::InsufficientSplitData(_) => ErrorKind::InsufficientSplitData,
            FlowcastError::TrainingError(_) | FlowcastError::ThreadPoolError(_) => ErrorKind::Training,
            FlowcastError::FeatureMismatch { .. } => ErrorKind::FeatureMismatch,
            FlowcastError::ConfigError(_) | FlowcastError::InvalidParameter { .. } => ErrorKind::Config,
            FlowcastError::IoError(_) => ErrorKind::Io,
            FlowcastError::SerializationError(_) => ErrorKind::Serialization,
            FlowcastError::DataError(_) => ErrorKind::Data,
            FlowcastError::ShapeError { .. } => ErrorKind::Shape,
            FlowcastError::Stage { source, .. } => source.kind(),
        }
    }
}

impl From<polars::error::PolarsError> for FlowcastError {
    fn from(err: polars::error::PolarsError) -> Self {
        FlowcastError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FlowcastError {
    fn from(err: serde_json::Error) -> Self {
        FlowcastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FlowcastError {
    fn from(err: ndarray::ShapeError) -> Self {
        FlowcastError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlowcastError::DataUnavailable("site 620883808".to_string());
        assert_eq!(err.to_string(), "Data unavailable: site 620883808");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FlowcastError = io_err.into();
        assert!(matches!(err, FlowcastError::IoError(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_stage_attribution_keeps_kind() {
        let err = FlowcastError::InsufficientSplitData("empty test partition".into()).at(Stage::Split);
        assert_eq!(err.stage(), Some(Stage::Split));
        assert_eq!(err.kind(), ErrorKind::InsufficientSplitData);
        assert_eq!(
            err.to_string(),
            "split stage failed: Insufficient split data: empty test partition"
        );

        // Re-attributing does not overwrite the first stage
        let err = err.at(Stage::Train);
        assert_eq!(err.stage(), Some(Stage::Split));
    }
}

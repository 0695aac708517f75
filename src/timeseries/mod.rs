//! Time series module
//!
//! Supervised-learning preparation of a daily discharge series:
//! - Calendar and cyclic (sin/cos) date features
//! - Lag features
//! - Trailing rolling mean / standard deviation
//! - Chronological train/test split at a timestamp quantile

mod features;
mod split;

pub use features::{cyclic, FeatureBuilder, FeatureConfig, FeatureRow, FeatureTable};
pub use split::{SplitBoundary, TemporalSplit, TemporalSplitter};

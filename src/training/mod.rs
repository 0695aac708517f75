//! Model training module
//!
//! Provides the regression forest used for discharge forecasting:
//! - CART regression trees with random feature subsets
//! - Bagged random forests built in parallel with per-tree seeds
//! - A trainer that binds a fitted forest to its feature names

pub mod decision_tree;
pub mod random_forest;
mod trainer;

pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForest};
pub use trainer::{ForestParams, TrainedModel, Trainer};

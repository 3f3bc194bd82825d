//! Model training
//!
//! Data splitting, the training loop and metrics tracking.

pub mod metrics;
pub mod split;
pub mod trainer;

pub use metrics::{Metrics, RegressionMetrics, TrainingHistory};
pub use split::{SplitDatasets, SplitRatios};
pub use trainer::{RegressionTrainer, TrainingOutcome};

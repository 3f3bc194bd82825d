//! Regression model
//!
//! A small MLP maps a feature vector to a points estimate. The artifact
//! module persists it together with its schema and normalization.

pub mod artifact;
pub mod mlp;

pub use artifact::{ModelArtifact, ModelMetadata};
pub use mlp::{PointsRegressor, RegressorConfig};

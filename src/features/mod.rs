//! Feature extraction
//!
//! Converts game sequences into model-ready feature vectors.

pub mod rolling;
pub mod schema;

pub use rolling::{next_game_features, FeatureVector, HistoryStatus, RollingFrame, WINDOW};
pub use schema::FeatureSchema;

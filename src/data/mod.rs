//! Data ingestion and storage
//!
//! Raw game history, synthetic generation, the training table, the live game
//! session, and the SQLite prediction log.

pub mod database;
pub mod dataset;
pub mod history;
pub mod session;
pub mod synthetic;

pub use database::Database;
pub use dataset::{FeaturedRow, PointsDataset};
pub use history::{HistoryRow, PlayerHistory};
pub use session::GameSession;
pub use synthetic::SyntheticGenerator;

//! Basketball next-game points prediction
//!
//! Predicts a player's point total for their next game from the five most
//! recent games, using rolling-window features and a small MLP regressor.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Regulation game length; overtime minutes are not accepted
pub const MAX_MINUTES: f32 = 48.0;

/// Upper bound on points accepted for a single game
pub const MAX_POINTS: u32 = 100;

/// Statistics for a single game played by one player
///
/// Construct through [`GameRecord::new`], which enforces the field ranges and
/// `field_goals_made <= field_goals_attempted`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecord {
    minutes: f32,
    points: u32,
    field_goals_attempted: u32,
    field_goals_made: u32,
    home_game: Option<bool>,
    game_date: Option<NaiveDate>,
}

impl GameRecord {
    /// Create a validated game record
    pub fn new(
        minutes: f32,
        points: u32,
        field_goals_attempted: u32,
        field_goals_made: u32,
    ) -> Result<Self> {
        if !minutes.is_finite() || !(0.0..=MAX_MINUTES).contains(&minutes) {
            return Err(HoopsError::DomainConstraint(format!(
                "minutes must be within 0..={}, got {}",
                MAX_MINUTES, minutes
            )));
        }
        if points > MAX_POINTS {
            return Err(HoopsError::DomainConstraint(format!(
                "points must be within 0..={}, got {}",
                MAX_POINTS, points
            )));
        }
        if field_goals_made > field_goals_attempted {
            return Err(HoopsError::DomainConstraint(format!(
                "field goals made ({}) exceeds field goals attempted ({})",
                field_goals_made, field_goals_attempted
            )));
        }

        Ok(GameRecord {
            minutes,
            points,
            field_goals_attempted,
            field_goals_made,
            home_game: None,
            game_date: None,
        })
    }

    /// Attach the home/away flag
    pub fn with_home_game(mut self, home: bool) -> Self {
        self.home_game = Some(home);
        self
    }

    /// Attach the date the game was played
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.game_date = Some(date);
        self
    }

    pub fn minutes(&self) -> f32 {
        self.minutes
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn field_goals_attempted(&self) -> u32 {
        self.field_goals_attempted
    }

    pub fn field_goals_made(&self) -> u32 {
        self.field_goals_made
    }

    pub fn home_game(&self) -> Option<bool> {
        self.home_game
    }

    pub fn game_date(&self) -> Option<NaiveDate> {
        self.game_date
    }
}

impl fmt::Display for GameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let venue = match self.home_game {
            Some(true) => "home",
            Some(false) => "away",
            None => "-",
        };
        write!(
            f,
            "{:>5.1} min {:>3} pts {:>2}/{:<2} FG {}",
            self.minutes,
            self.points,
            self.field_goals_made,
            self.field_goals_attempted,
            venue
        )
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopsError {
    #[error("Session already holds {capacity} games - clear it before adding more")]
    CapacityExceeded { capacity: usize },

    #[error("Insufficient history: have {games} games, need exactly {required}")]
    InsufficientHistory { games: usize, required: usize },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Feature vector has {actual} values but the model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Invalid game record: {0}")]
    DomainConstraint(String),

    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, HoopsError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Raw per-game history CSV
    pub raw_path: String,
    /// Derived feature/target CSV used for training
    pub featured_path: String,
    /// Model artifact stem (`.mpk` and `.json` are appended)
    pub model_path: String,
    /// SQLite prediction log
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Feature schema tag used when training (`core-v1` or `home-v2`)
    pub schema: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub dropout: f64,
    pub hidden_dims: Vec<usize>,
    pub early_stopping_patience: usize,
    /// Share of all rows held out for the final evaluation
    pub test_fraction: f32,
    /// Share of all rows used for early stopping
    pub validation_fraction: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub games_per_player: usize,
    pub start_date: NaiveDate,
    pub players: Vec<String>,
    pub teams: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                raw_path: "data/raw/games.csv".to_string(),
                featured_path: "data/processed/featured.csv".to_string(),
                model_path: "model/points_model".to_string(),
                database_path: "data/predictions.db".to_string(),
            },
            features: FeatureConfig {
                schema: "home-v2".to_string(),
            },
            training: TrainingConfig {
                epochs: 300,
                batch_size: 32,
                learning_rate: 1e-3,
                weight_decay: 1e-4,
                dropout: 0.1,
                hidden_dims: vec![32, 16],
                early_stopping_patience: 30,
                test_fraction: 0.2,
                validation_fraction: 0.1,
                seed: 42,
            },
            synthetic: SyntheticConfig {
                seed: 42,
                games_per_player: 82,
                start_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap_or_default(),
                players: ["Player_A", "Player_B", "Player_C", "Player_D", "Player_E"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                teams: ["LAL", "GSW", "BOS", "MIL", "PHX", "DEN", "MIA"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopsError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| HoopsError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

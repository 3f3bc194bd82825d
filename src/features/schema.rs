//! Versioned feature schemas
//!
//! A trained model and the feature engine that feeds it must agree on one
//! schema. The tag is stored with the model artifact and checked on load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{HoopsError, Result};

pub const AVG_PTS_LAST_5: &str = "avg_pts_last_5";
pub const AVG_MIN_LAST_5: &str = "avg_min_last_5";
pub const TREND_PTS: &str = "trend_pts";
pub const MINUTES: &str = "minutes";
pub const HOME_GAME: &str = "home_game";
pub const FGA: &str = "FGA";
pub const FGM: &str = "FGM";

const CORE_FEATURES: [&str; 6] = [AVG_PTS_LAST_5, AVG_MIN_LAST_5, TREND_PTS, MINUTES, FGA, FGM];

const HOME_AWAY_FEATURES: [&str; 7] = [
    AVG_PTS_LAST_5,
    AVG_MIN_LAST_5,
    TREND_PTS,
    MINUTES,
    HOME_GAME,
    FGA,
    FGM,
];

/// Ordered feature set a model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureSchema {
    /// Rolling stats plus the last game's minutes and shooting volume
    #[serde(rename = "core-v1")]
    Core,
    /// Core features with the last game's home/away flag inserted after minutes
    #[serde(rename = "home-v2")]
    HomeAway,
}

impl FeatureSchema {
    pub const ALL: [FeatureSchema; 2] = [FeatureSchema::Core, FeatureSchema::HomeAway];

    /// Stable tag stored in model metadata and config files
    pub fn tag(&self) -> &'static str {
        match self {
            FeatureSchema::Core => "core-v1",
            FeatureSchema::HomeAway => "home-v2",
        }
    }

    /// Feature names in model input order
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            FeatureSchema::Core => &CORE_FEATURES,
            FeatureSchema::HomeAway => &HOME_AWAY_FEATURES,
        }
    }

    /// Number of features in this schema
    pub fn dim(&self) -> usize {
        self.names().len()
    }

    /// Whether the home/away flag is part of the vector
    pub fn requires_home_game(&self) -> bool {
        matches!(self, FeatureSchema::HomeAway)
    }

    /// Position of a named feature, if the schema contains it
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names().iter().position(|n| *n == name)
    }

    /// Check that a model input width agrees with this schema
    pub fn check_dim(&self, dim: usize) -> Result<()> {
        if dim != self.dim() {
            return Err(HoopsError::ShapeMismatch {
                expected: self.dim(),
                actual: dim,
            });
        }
        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        FeatureSchema::HomeAway
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for FeatureSchema {
    type Err = HoopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "core-v1" | "core" | "a" => Ok(FeatureSchema::Core),
            "home-v2" | "home" | "b" => Ok(FeatureSchema::HomeAway),
            other => Err(HoopsError::Schema(format!(
                "Unknown feature schema '{}'. Use core-v1 or home-v2.",
                other
            ))),
        }
    }
}

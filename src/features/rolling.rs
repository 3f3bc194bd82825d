//! Rolling-window feature engine
//!
//! Turns a chronological sequence of games into lagged rolling features.
//! The same frame computation feeds the offline training table and the live
//! next-game prediction, so both paths see identical feature values.
//!
//! For a sequence of `n` games the frame has `n + 1` rows. Row `i` describes
//! game `i` using only games strictly before it; row `n` describes the next,
//! unplayed game. Rolling means cover the `WINDOW` games before the row and
//! stay undefined until a full window exists.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::FeatureSchema;
use crate::{GameRecord, HoopsError, Result};

/// Rolling window size in games
pub const WINDOW: usize = 5;

/// Whether a feature vector was computed from a full rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HistoryStatus {
    /// All rolling features came from `WINDOW` prior games
    Full,
    /// Fewer than `WINDOW` prior games; undefined features were replaced by 0
    ZeroFilled { available: usize },
}

impl HistoryStatus {
    pub fn is_full(&self) -> bool {
        matches!(self, HistoryStatus::Full)
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryStatus::Full => write!(f, "full"),
            HistoryStatus::ZeroFilled { available } => {
                write!(f, "zero-filled ({}/{} games)", available, WINDOW)
            }
        }
    }
}

/// Model input for one game, in schema order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: Vec<f32>,
    history: HistoryStatus,
}

impl FeatureVector {
    /// Wrap raw values, checking the length against the schema
    pub fn new(schema: FeatureSchema, values: Vec<f32>, history: HistoryStatus) -> Result<Self> {
        schema.check_dim(values.len())?;
        Ok(FeatureVector {
            schema,
            values,
            history,
        })
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn history(&self) -> HistoryStatus {
        self.history
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<f32> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    /// (name, value) pairs in schema order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.schema
            .names()
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// Mean over each trailing window of `window` values
///
/// Position `i` holds the mean of `values[i + 1 - window..=i]`, or `None` while
/// fewer than `window` values are available.
pub fn rolling_mean(values: &[f32], window: usize) -> Vec<Option<f32>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            let sum: f64 = values[i + 1 - window..=i].iter().map(|&v| v as f64).sum();
            Some((sum / window as f64) as f32)
        })
        .collect()
}

/// Lag a series by one position, extending it by one
///
/// The result has `len + 1` entries: position 0 is undefined and position
/// `i` holds the input's value at `i - 1`, so the last entry belongs to the
/// position after the input ends.
pub fn lag<T: Copy>(values: &[Option<T>]) -> Vec<Option<T>> {
    std::iter::once(None).chain(values.iter().copied()).collect()
}

/// One row of the rolling frame
#[derive(Debug, Clone, Copy)]
pub struct FrameRow<'a> {
    /// Mean points over the `WINDOW` games before this row
    pub avg_pts_last_5: Option<f32>,
    /// Mean minutes over the `WINDOW` games before this row
    pub avg_min_last_5: Option<f32>,
    /// Previous game's points minus `avg_pts_last_5`
    pub trend_pts: Option<f32>,
    /// Most recent game before this row, source of the raw context features
    pub previous: Option<&'a GameRecord>,
    /// Number of prior games available to this row (capped at `WINDOW`)
    pub prior_games: usize,
}

impl FrameRow<'_> {
    pub fn history(&self) -> HistoryStatus {
        if self.avg_pts_last_5.is_some() && self.avg_min_last_5.is_some() {
            HistoryStatus::Full
        } else {
            HistoryStatus::ZeroFilled {
                available: self.prior_games,
            }
        }
    }

    /// Assemble the model input for this row, replacing undefined values by 0
    pub fn to_vector(&self, schema: FeatureSchema) -> Result<FeatureVector> {
        let minutes = self.previous.map_or(0.0, |g| g.minutes());
        let fga = self.previous.map_or(0.0, |g| g.field_goals_attempted() as f32);
        let fgm = self.previous.map_or(0.0, |g| g.field_goals_made() as f32);

        let mut values = Vec::with_capacity(schema.dim());
        values.push(self.avg_pts_last_5.unwrap_or(0.0));
        values.push(self.avg_min_last_5.unwrap_or(0.0));
        values.push(self.trend_pts.unwrap_or(0.0));
        values.push(minutes);
        if schema.requires_home_game() {
            let home = match self.previous {
                Some(game) => game.home_game().ok_or_else(|| {
                    HoopsError::Schema(format!(
                        "schema {} needs the home/away flag of the most recent game",
                        schema
                    ))
                })?,
                None => false,
            };
            values.push(if home { 1.0 } else { 0.0 });
        }
        values.push(fga);
        values.push(fgm);

        FeatureVector::new(schema, values, self.history())
    }
}

/// Rolling features for every game of one player's chronological sequence
pub struct RollingFrame<'a> {
    games: &'a [GameRecord],
    avg_pts: Vec<Option<f32>>,
    avg_min: Vec<Option<f32>>,
    trend_pts: Vec<Option<f32>>,
}

impl<'a> RollingFrame<'a> {
    /// Compute the frame for games ordered oldest to newest
    pub fn compute(games: &'a [GameRecord]) -> Self {
        let points: Vec<f32> = games.iter().map(|g| g.points() as f32).collect();
        let minutes: Vec<f32> = games.iter().map(|g| g.minutes()).collect();

        let avg_pts = lag(&rolling_mean(&points, WINDOW));
        let avg_min = lag(&rolling_mean(&minutes, WINDOW));
        let prev_points = lag(&points.iter().copied().map(Some).collect::<Vec<_>>());

        let trend_pts = prev_points
            .iter()
            .zip(avg_pts.iter())
            .map(|(prev, avg)| match (prev, avg) {
                (Some(p), Some(a)) => Some(p - a),
                _ => None,
            })
            .collect();

        RollingFrame {
            games,
            avg_pts,
            avg_min,
            trend_pts,
        }
    }

    /// Number of rows: one per known game plus the next game
    pub fn len(&self) -> usize {
        self.avg_pts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avg_pts.is_empty()
    }

    /// Row describing game `index`; `index == games.len()` is the next game
    pub fn row(&self, index: usize) -> Option<FrameRow<'a>> {
        if index >= self.len() {
            return None;
        }
        Some(FrameRow {
            avg_pts_last_5: self.avg_pts[index],
            avg_min_last_5: self.avg_min[index],
            trend_pts: self.trend_pts[index],
            previous: index.checked_sub(1).map(|i| &self.games[i]),
            prior_games: index.min(WINDOW),
        })
    }

    /// Row describing the next, unplayed game
    pub fn next_game(&self) -> FrameRow<'a> {
        FrameRow {
            avg_pts_last_5: self.avg_pts[self.games.len()],
            avg_min_last_5: self.avg_min[self.games.len()],
            trend_pts: self.trend_pts[self.games.len()],
            previous: self.games.last(),
            prior_games: self.games.len().min(WINDOW),
        }
    }

    /// Rows for the known games, paired with the game each row describes
    pub fn played(&self) -> impl Iterator<Item = (FrameRow<'a>, &'a GameRecord)> + '_ {
        self.games
            .iter()
            .enumerate()
            .filter_map(move |(i, game)| self.row(i).map(|row| (row, game)))
    }
}

/// Feature vector for the game after `games` (ordered oldest to newest)
pub fn next_game_features(games: &[GameRecord], schema: FeatureSchema) -> Result<FeatureVector> {
    if games.is_empty() {
        return Err(HoopsError::InsufficientHistory {
            games: 0,
            required: WINDOW,
        });
    }
    RollingFrame::compute(games).next_game().to_vector(schema)
}

//! In-memory store for the games of the player currently being predicted

use serde::Serialize;

use crate::features::{next_game_features, FeatureSchema, FeatureVector, WINDOW};
use crate::{GameRecord, HoopsError, Result};

/// Number of games a prediction request needs
pub const SESSION_CAPACITY: usize = WINDOW;

/// Ordered games (oldest first) entered for one player
///
/// Owned by whoever drives the interaction; there is no shared session state.
#[derive(Debug, Clone, Default)]
pub struct GameSession {
    games: Vec<GameRecord>,
}

/// Means over the games held by a session, for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub games: usize,
    pub avg_points: f32,
    pub avg_minutes: f32,
    pub avg_fga: f32,
    pub avg_fgm: f32,
    /// Games with the home flag set; games without a flag are not counted
    pub home_games: usize,
}

impl GameSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from games ordered oldest first
    pub fn from_games(games: impl IntoIterator<Item = GameRecord>) -> Result<Self> {
        let mut session = Self::new();
        for game in games {
            session.add(game)?;
        }
        Ok(session)
    }

    /// Append a game; a full session rejects the game and stays unchanged
    pub fn add(&mut self, game: GameRecord) -> Result<()> {
        if self.is_full() {
            return Err(HoopsError::CapacityExceeded {
                capacity: SESSION_CAPACITY,
            });
        }
        self.games.push(game);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.games.clear();
    }

    pub fn count(&self) -> usize {
        self.games.len()
    }

    pub fn is_full(&self) -> bool {
        self.games.len() >= SESSION_CAPACITY
    }

    pub fn remaining(&self) -> usize {
        SESSION_CAPACITY.saturating_sub(self.games.len())
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    /// Features for the next game; requires a full session
    pub fn features(&self, schema: FeatureSchema) -> Result<FeatureVector> {
        if self.games.len() != SESSION_CAPACITY {
            return Err(HoopsError::InsufficientHistory {
                games: self.games.len(),
                required: SESSION_CAPACITY,
            });
        }
        next_game_features(&self.games, schema)
    }

    pub fn summary(&self) -> SessionSummary {
        if self.games.is_empty() {
            return SessionSummary::default();
        }

        let n = self.games.len() as f32;
        let mean = |f: fn(&GameRecord) -> f32| self.games.iter().map(f).sum::<f32>() / n;

        SessionSummary {
            games: self.games.len(),
            avg_points: mean(|g| g.points() as f32),
            avg_minutes: mean(|g| g.minutes()),
            avg_fga: mean(|g| g.field_goals_attempted() as f32),
            avg_fgm: mean(|g| g.field_goals_made() as f32),
            home_games: self
                .games
                .iter()
                .filter(|g| g.home_game() == Some(true))
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(points: u32) -> GameRecord {
        GameRecord::new(32.0, points, 18, 8).unwrap().with_home_game(points % 2 == 0)
    }

    #[test]
    fn test_add_until_full() {
        let mut session = GameSession::new();
        assert_eq!(session.count(), 0);
        assert_eq!(session.remaining(), 5);

        for p in 20..25 {
            session.add(game(p)).unwrap();
        }
        assert_eq!(session.count(), 5);
        assert!(session.is_full());
        assert_eq!(session.remaining(), 0);
    }

    #[test]
    fn test_sixth_game_rejected_without_change() {
        let mut session = GameSession::from_games((20..25).map(game)).unwrap();
        let before = session.games().to_vec();

        let err = session.add(game(40)).unwrap_err();
        assert!(matches!(err, HoopsError::CapacityExceeded { capacity: 5 }));
        assert_eq!(session.games(), before.as_slice());
    }

    #[test]
    fn test_clear_resets() {
        let mut session = GameSession::from_games((20..23).map(game)).unwrap();
        session.clear();
        assert_eq!(session.count(), 0);
        assert!(session.add(game(10)).is_ok());
    }

    #[test]
    fn test_features_need_exactly_five() {
        let session = GameSession::from_games((20..24).map(game)).unwrap();
        let err = session.features(FeatureSchema::Core).unwrap_err();
        assert!(matches!(
            err,
            HoopsError::InsufficientHistory {
                games: 4,
                required: 5
            }
        ));

        let session = GameSession::from_games((20..25).map(game)).unwrap();
        let features = session.features(FeatureSchema::HomeAway).unwrap();
        assert_eq!(features.len(), 7);
        assert!(features.history().is_full());
    }

    #[test]
    fn test_summary_means() {
        let session = GameSession::from_games((20..25).map(game)).unwrap();
        let summary = session.summary();
        assert_eq!(summary.games, 5);
        assert!((summary.avg_points - 22.0).abs() < 1e-5);
        assert!((summary.avg_minutes - 32.0).abs() < 1e-5);
        assert!((summary.avg_fga - 18.0).abs() < 1e-5);
        assert_eq!(summary.home_games, 3);

        assert_eq!(GameSession::new().summary(), SessionSummary::default());
    }
}

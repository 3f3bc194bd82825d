//! SQLite prediction log

use rusqlite::{params, Connection};
use std::path::Path;

use crate::Result;

/// A prediction about to be logged
#[derive(Debug, Clone)]
pub struct PredictionEntry {
    /// Free-form label for who the prediction is about
    pub player: Option<String>,
    pub schema: String,
    pub history: String,
    pub predicted_points: f32,
    pub features: Vec<f32>,
}

/// A logged prediction
#[derive(Debug, Clone)]
pub struct StoredPrediction {
    pub id: i64,
    pub created_at: String,
    pub player: Option<String>,
    pub schema: String,
    pub history: String,
    pub predicted_points: f32,
    pub features: Vec<f32>,
}

/// Log statistics
#[derive(Debug, Clone)]
pub struct LogStats {
    pub prediction_count: usize,
    pub first_prediction: Option<String>,
    pub last_prediction: Option<String>,
}

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                player TEXT,
                schema_tag TEXT NOT NULL,
                history TEXT NOT NULL,
                predicted_points REAL NOT NULL,
                features TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_predictions_player ON predictions(player);
            "#,
        )?;
        Ok(())
    }

    /// Store a prediction, returning its row id
    pub fn insert_prediction(&self, entry: &PredictionEntry) -> Result<i64> {
        let features = serde_json::to_string(&entry.features)?;
        self.conn.execute(
            "INSERT INTO predictions (player, schema_tag, history, predicted_points, features)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.player,
                entry.schema,
                entry.history,
                entry.predicted_points as f64,
                features
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent predictions, newest first
    pub fn recent_predictions(&self, limit: usize) -> Result<Vec<StoredPrediction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, player, schema_tag, history, predicted_points, features
             FROM predictions ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            let features_json: String = row.get(6)?;
            let predicted: f64 = row.get(5)?;
            Ok(StoredPrediction {
                id: row.get(0)?,
                created_at: row.get(1)?,
                player: row.get(2)?,
                schema: row.get(3)?,
                history: row.get(4)?,
                predicted_points: predicted as f32,
                features: serde_json::from_str(&features_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        6,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
            })
        })?;

        let mut predictions = Vec::new();
        for row in rows {
            predictions.push(row?);
        }
        Ok(predictions)
    }

    pub fn get_stats(&self) -> Result<LogStats> {
        let prediction_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
        let (first_prediction, last_prediction): (Option<String>, Option<String>) =
            self.conn.query_row(
                "SELECT MIN(created_at), MAX(created_at) FROM predictions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

        Ok(LogStats {
            prediction_count: prediction_count as usize,
            first_prediction,
            last_prediction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(player: Option<&str>, points: f32) -> PredictionEntry {
        PredictionEntry {
            player: player.map(str::to_string),
            schema: "home-v2".to_string(),
            history: "full".to_string(),
            predicted_points: points,
            features: vec![26.2, 34.56, 1.8, 34.7, 0.0, 14.0, 5.0],
        }
    }

    #[test]
    fn test_insert_and_list() {
        let db = Database::in_memory().unwrap();
        let first = db.insert_prediction(&entry(Some("Player_A"), 21.5)).unwrap();
        let second = db.insert_prediction(&entry(None, 18.25)).unwrap();
        assert!(second > first);

        let recent = db.recent_predictions(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[0].player, None);
        assert_eq!(recent[1].player.as_deref(), Some("Player_A"));
        assert!((recent[1].predicted_points - 21.5).abs() < 1e-6);
        assert_eq!(recent[1].features.len(), 7);
        assert_eq!(recent[1].schema, "home-v2");

        assert_eq!(db.recent_predictions(1).unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_features_column_is_reported() {
        let db = Database::in_memory().unwrap();
        let id = db.insert_prediction(&entry(None, 20.0)).unwrap();
        db.conn
            .execute(
                "UPDATE predictions SET features = 'not json' WHERE id = ?1",
                params![id],
            )
            .unwrap();

        let err = db.recent_predictions(10).unwrap_err();
        assert!(matches!(
            err,
            crate::HoopsError::Database(rusqlite::Error::FromSqlConversionFailure(6, _, _))
        ));
    }

    #[test]
    fn test_stats() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.prediction_count, 0);
        assert!(stats.first_prediction.is_none());

        db.insert_prediction(&entry(Some("Player_B"), 12.0)).unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.prediction_count, 1);
        assert!(stats.last_prediction.is_some());
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("predictions.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_prediction(&entry(None, 10.0)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_stats().unwrap().prediction_count, 1);
    }
}

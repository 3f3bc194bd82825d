//! Training table and Burn dataset
//!
//! Builds one (features, target) row per game that has a full rolling window
//! behind it, persists the table as CSV, and serves it to Burn's data loader.

use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::history::PlayerHistory;
use crate::features::schema::{
    AVG_MIN_LAST_5, AVG_PTS_LAST_5, FGA, FGM, HOME_GAME, MINUTES, TREND_PTS,
};
use crate::features::{FeatureSchema, RollingFrame};
use crate::{HoopsError, Result};

/// One training example
///
/// The context columns (`minutes`, `home_game`, `FGA`, `FGM`) belong to the
/// game before `game_date`, exactly as the live path uses the most recent
/// known game to describe the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedRow {
    pub player_name: String,
    pub game_date: Option<NaiveDate>,
    pub avg_pts_last_5: f32,
    pub avg_min_last_5: f32,
    pub trend_pts: f32,
    pub minutes: f32,
    pub home_game: Option<u8>,
    #[serde(rename = "FGA")]
    pub fga: u32,
    #[serde(rename = "FGM")]
    pub fgm: u32,
    pub target_points: u32,
}

impl FeaturedRow {
    /// Feature values in schema order
    pub fn features(&self, schema: FeatureSchema) -> Result<Vec<f32>> {
        schema
            .names()
            .iter()
            .map(|name| match *name {
                AVG_PTS_LAST_5 => Ok(self.avg_pts_last_5),
                AVG_MIN_LAST_5 => Ok(self.avg_min_last_5),
                TREND_PTS => Ok(self.trend_pts),
                MINUTES => Ok(self.minutes),
                FGA => Ok(self.fga as f32),
                FGM => Ok(self.fgm as f32),
                HOME_GAME => self.home_game.map(|h| h as f32).ok_or_else(|| {
                    HoopsError::Schema(format!(
                        "{} row for {} has no home_game value",
                        self.player_name,
                        self.game_date
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "unknown date".to_string())
                    ))
                }),
                other => Err(HoopsError::Schema(format!("unknown feature column {}", other))),
            })
            .collect()
    }
}

/// Build the training table for every player
///
/// Games without a full rolling window behind them are left out.
pub fn build_featured_rows(histories: &[PlayerHistory]) -> Vec<FeaturedRow> {
    let mut rows = Vec::new();

    for player in histories {
        let frame = RollingFrame::compute(&player.games);
        let mut skipped = 0;

        for (row, game) in frame.played() {
            let (Some(avg_pts), Some(avg_min), Some(trend), Some(prev)) =
                (row.avg_pts_last_5, row.avg_min_last_5, row.trend_pts, row.previous)
            else {
                skipped += 1;
                continue;
            };

            rows.push(FeaturedRow {
                player_name: player.name.clone(),
                game_date: game.game_date(),
                avg_pts_last_5: avg_pts,
                avg_min_last_5: avg_min,
                trend_pts: trend,
                minutes: prev.minutes(),
                home_game: prev.home_game().map(u8::from),
                fga: prev.field_goals_attempted(),
                fgm: prev.field_goals_made(),
                target_points: game.points(),
            });
        }

        log::debug!(
            "{}: {} training rows, {} games without full history",
            player.name,
            player.games.len() - skipped,
            skipped
        );
    }

    rows
}

pub fn read_featured<P: AsRef<Path>>(path: P) -> Result<Vec<FeaturedRow>> {
    read_featured_from_reader(File::open(path)?)
}

pub fn read_featured_from_reader<R: Read>(rdr: R) -> Result<Vec<FeaturedRow>> {
    let mut reader = csv::Reader::from_reader(rdr);
    reader
        .deserialize::<FeaturedRow>()
        .map(|r| r.map_err(|e| HoopsError::Schema(e.to_string())))
        .collect()
}

pub fn write_featured<P: AsRef<Path>>(path: P, rows: &[FeaturedRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_featured_to_writer(File::create(path)?, rows)
}

pub fn write_featured_to_writer<W: Write>(wtr: W, rows: &[FeaturedRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(wtr);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Z-score normalization for model inputs, computed from training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalization {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl FeatureNormalization {
    pub fn from_samples(samples: &[PointsSample], dim: usize) -> Self {
        if samples.is_empty() {
            return FeatureNormalization {
                mean: vec![0.0; dim],
                std: vec![1.0; dim],
            };
        }

        let mut sum = vec![0.0f64; dim];
        let mut sum_sq = vec![0.0f64; dim];
        for sample in samples {
            for (j, &v) in sample.features.iter().enumerate().take(dim) {
                sum[j] += v as f64;
                sum_sq[j] += (v as f64) * (v as f64);
            }
        }

        let n = samples.len() as f64;
        let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();
        let std = sum_sq
            .iter()
            .zip(mean.iter())
            .map(|(sq, m)| ((sq / n - m * m).max(0.0).sqrt() as f32).max(0.001))
            .collect();

        FeatureNormalization {
            mean: mean.into_iter().map(|m| m as f32).collect(),
            std,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Normalize one feature row: (x - mean) / std
    pub fn normalize(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }
}

/// Target normalization (computed from training data)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetNormalization {
    pub mean: f32,
    pub std: f32,
}

impl Default for TargetNormalization {
    fn default() -> Self {
        TargetNormalization {
            mean: 0.0,
            std: 1.0,
        }
    }
}

impl TargetNormalization {
    pub fn from_samples(samples: &[PointsSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f32;
        let mean = samples.iter().map(|s| s.target).sum::<f32>() / n;
        let variance = samples.iter().map(|s| (s.target - mean).powi(2)).sum::<f32>() / n;

        TargetNormalization {
            mean,
            std: variance.sqrt().max(1.0),
        }
    }

    pub fn normalize(&self, points: f32) -> f32 {
        (points - self.mean) / self.std
    }

    pub fn denormalize(&self, normalized: f32) -> f32 {
        normalized * self.std + self.mean
    }
}

/// A single training sample
#[derive(Debug, Clone, PartialEq)]
pub struct PointsSample {
    pub features: Vec<f32>,
    pub target: f32,
}

/// Dataset of feature rows for one schema
#[derive(Debug, Clone)]
pub struct PointsDataset {
    samples: Vec<PointsSample>,
    schema: FeatureSchema,
}

impl PointsDataset {
    /// Select the schema's columns from the training table
    pub fn from_featured(rows: &[FeaturedRow], schema: FeatureSchema) -> Result<Self> {
        let samples = rows
            .iter()
            .map(|row| {
                Ok(PointsSample {
                    features: row.features(schema)?,
                    target: row.target_points as f32,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PointsDataset { samples, schema })
    }

    pub fn from_samples(samples: Vec<PointsSample>, schema: FeatureSchema) -> Self {
        PointsDataset { samples, schema }
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn samples(&self) -> &[PointsSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<PointsSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Copy of the dataset with features and targets normalized
    pub fn normalized(&self, features: &FeatureNormalization, target: TargetNormalization) -> Self {
        let samples = self
            .samples
            .iter()
            .map(|s| PointsSample {
                features: features.normalize(&s.features),
                target: target.normalize(s.target),
            })
            .collect();

        PointsDataset {
            samples,
            schema: self.schema,
        }
    }
}

impl Dataset<PointsSample> for PointsDataset {
    fn get(&self, index: usize) -> Option<PointsSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Batch of samples for training
#[derive(Debug, Clone)]
pub struct PointsBatch<B: Backend> {
    /// Features: [batch, dim]
    pub features: Tensor<B, 2>,
    /// Targets: [batch, 1]
    pub targets: Tensor<B, 2>,
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct PointsBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> PointsBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        PointsBatcher { device }
    }
}

impl<B: Backend> burn::data::dataloader::batcher::Batcher<B, PointsSample, PointsBatch<B>>
    for PointsBatcher<B>
{
    fn batch(&self, items: Vec<PointsSample>, _device: &B::Device) -> PointsBatch<B> {
        let batch_size = items.len();
        let dim = items.first().map(|s| s.features.len()).unwrap_or(0);

        let mut feature_data = Vec::with_capacity(batch_size * dim);
        let mut target_data = Vec::with_capacity(batch_size);
        for sample in &items {
            feature_data.extend_from_slice(&sample.features);
            target_data.push(sample.target);
        }

        let features = Tensor::<B, 1>::from_floats(feature_data.as_slice(), &self.device)
            .reshape([batch_size, dim]);
        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        PointsBatch { features, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::history::PlayerHistory;
    use crate::GameRecord;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray<f32>;

    fn player(name: &str, points: &[u32]) -> PlayerHistory {
        let start = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        PlayerHistory {
            name: name.to_string(),
            games: points
                .iter()
                .enumerate()
                .map(|(i, &p)| {
                    GameRecord::new(30.0 + i as f32, p, 20, 10)
                        .unwrap()
                        .with_home_game(i % 2 == 0)
                        .with_date(start + chrono::Duration::days(i as i64))
                })
                .collect(),
        }
    }

    #[test]
    fn test_rows_only_for_full_history() {
        let histories = vec![
            player("A", &[10, 12, 14, 16, 18, 20, 22]),
            player("B", &[5, 5, 5, 5]),
        ];
        let rows = build_featured_rows(&histories);

        // A: games 5 and 6 have five prior games, B never does
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.player_name == "A"));

        let first = &rows[0];
        assert_eq!(first.target_points, 20);
        assert!((first.avg_pts_last_5 - 14.0).abs() < 1e-5);
        assert!((first.trend_pts - 4.0).abs() < 1e-5);
        // Context comes from game 4, never from the target game
        assert!((first.minutes - 34.0).abs() < 1e-5);
        assert_eq!(first.home_game, Some(1));
        assert_eq!(first.game_date, NaiveDate::from_ymd_opt(2024, 10, 6));

        let second = &rows[1];
        assert_eq!(second.target_points, 22);
        assert!((second.avg_pts_last_5 - 16.0).abs() < 1e-5);
        assert_eq!(second.home_game, Some(0));
    }

    #[test]
    fn test_training_row_matches_live_vector() {
        use crate::features::next_game_features;

        let history = player("A", &[10, 12, 14, 16, 18, 20]);
        let rows = build_featured_rows(std::slice::from_ref(&history));
        let live = next_game_features(&history.games[..5], FeatureSchema::HomeAway).unwrap();

        assert_eq!(rows[0].features(FeatureSchema::HomeAway).unwrap(), live.as_slice());
    }

    #[test]
    fn test_featured_csv_roundtrip() {
        let rows = build_featured_rows(&[player("A", &[10, 12, 14, 16, 18, 20, 22])]);
        let mut buf = Vec::new();
        write_featured_to_writer(&mut buf, &rows).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(
            "player_name,game_date,avg_pts_last_5,avg_min_last_5,trend_pts,minutes,home_game,FGA,FGM,target_points"
        ));
        assert_eq!(read_featured_from_reader(buf.as_slice()).unwrap(), rows);
    }

    #[test]
    fn test_missing_home_flag_is_schema_error() {
        let mut row = build_featured_rows(&[player("A", &[10, 12, 14, 16, 18, 20])])[0].clone();
        row.home_game = None;
        assert_eq!(row.features(FeatureSchema::Core).unwrap().len(), 6);
        assert!(matches!(
            row.features(FeatureSchema::HomeAway),
            Err(HoopsError::Schema(_))
        ));
    }

    #[test]
    fn test_normalization() {
        let samples = vec![
            PointsSample {
                features: vec![1.0, 10.0],
                target: 10.0,
            },
            PointsSample {
                features: vec![3.0, 10.0],
                target: 30.0,
            },
        ];
        let norm = FeatureNormalization::from_samples(&samples, 2);
        assert_eq!(norm.mean, vec![2.0, 10.0]);
        assert!((norm.std[0] - 1.0).abs() < 1e-6);
        // Constant column keeps a floor instead of dividing by zero
        assert!((norm.std[1] - 0.001).abs() < 1e-6);
        assert_eq!(norm.normalize(&[3.0, 10.0]), vec![1.0, 0.0]);

        let target = TargetNormalization::from_samples(&samples);
        assert!((target.mean - 20.0).abs() < 1e-6);
        assert!((target.std - 10.0).abs() < 1e-6);
        assert!((target.denormalize(target.normalize(27.5)) - 27.5).abs() < 1e-5);
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let batcher = PointsBatcher::<TestBackend>::new(device);
        let items = vec![
            PointsSample {
                features: vec![1.0, 2.0, 3.0],
                target: 1.0,
            },
            PointsSample {
                features: vec![4.0, 5.0, 6.0],
                target: 2.0,
            },
        ];
        let batch = batcher.batch(items, &Default::default());
        assert_eq!(batch.features.dims(), [2, 3]);
        assert_eq!(batch.targets.dims(), [2, 1]);
    }
}

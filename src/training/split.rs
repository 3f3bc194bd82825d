//! Seeded train/validation/test splits

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::{PointsDataset, PointsSample};
use crate::{HoopsError, Result};

/// Split fractions of the full dataset
#[derive(Debug, Clone, Copy)]
pub struct SplitRatios {
    pub validation: f32,
    pub test: f32,
}

impl Default for SplitRatios {
    fn default() -> Self {
        SplitRatios {
            validation: 0.1,
            test: 0.2,
        }
    }
}

/// Shuffled, disjoint datasets
pub struct SplitDatasets {
    pub train: PointsDataset,
    pub val: PointsDataset,
    pub test: PointsDataset,
}

impl SplitDatasets {
    /// Shuffle with `seed`, then cut test and validation sets off the front
    pub fn from_dataset(full: PointsDataset, ratios: SplitRatios, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&ratios.test)
            || !(0.0..1.0).contains(&ratios.validation)
            || ratios.test + ratios.validation >= 1.0
        {
            return Err(HoopsError::Config(format!(
                "invalid split: test {} + validation {} must be below 1",
                ratios.test, ratios.validation
            )));
        }

        let schema = full.schema();
        let mut samples: Vec<PointsSample> = full.into_samples();
        let n = samples.len();
        let n_test = (n as f32 * ratios.test).ceil() as usize;
        let n_val = (n as f32 * ratios.validation).ceil() as usize;

        if n_test == 0 || n_val == 0 || n_test + n_val >= n {
            return Err(HoopsError::Config(format!(
                "Not enough data to split {} samples into train/validation/test",
                n
            )));
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let train_samples = samples.split_off(n_test + n_val);
        let val_samples = samples.split_off(n_test);
        let test_samples = samples;

        log::info!(
            "Split {} samples: train={}, val={}, test={}",
            n,
            train_samples.len(),
            val_samples.len(),
            test_samples.len()
        );

        Ok(SplitDatasets {
            train: PointsDataset::from_samples(train_samples, schema),
            val: PointsDataset::from_samples(val_samples, schema),
            test: PointsDataset::from_samples(test_samples, schema),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;

    fn dataset(n: usize) -> PointsDataset {
        let samples = (0..n)
            .map(|i| PointsSample {
                features: vec![i as f32; 6],
                target: i as f32,
            })
            .collect();
        PointsDataset::from_samples(samples, FeatureSchema::Core)
    }

    fn targets(ds: &PointsDataset) -> Vec<f32> {
        ds.samples().iter().map(|s| s.target).collect()
    }

    #[test]
    fn test_split_sizes_and_disjoint() {
        let split = SplitDatasets::from_dataset(dataset(100), SplitRatios::default(), 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.val.len(), 10);
        assert_eq!(split.train.len(), 70);

        let mut all: Vec<f32> = [
            targets(&split.train),
            targets(&split.val),
            targets(&split.test),
        ]
        .concat();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, (0..100).map(|i| i as f32).collect::<Vec<_>>());
        assert_eq!(split.train.schema(), FeatureSchema::Core);
    }

    #[test]
    fn test_split_is_seeded() {
        let a = SplitDatasets::from_dataset(dataset(50), SplitRatios::default(), 1).unwrap();
        let b = SplitDatasets::from_dataset(dataset(50), SplitRatios::default(), 1).unwrap();
        assert_eq!(targets(&a.test), targets(&b.test));
    }

    #[test]
    fn test_split_rejects_bad_inputs() {
        assert!(SplitDatasets::from_dataset(dataset(2), SplitRatios::default(), 1).is_err());
        let bad = SplitRatios {
            validation: 0.5,
            test: 0.5,
        };
        assert!(SplitDatasets::from_dataset(dataset(100), bad, 1).is_err());
    }
}

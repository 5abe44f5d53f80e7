//! The PQ index family and its building blocks.

pub mod codebook;
pub mod config;
pub mod cursor;
pub mod ivf_pq;
pub mod lookup;
pub mod pq;
pub mod probe;
pub mod quantizer;
pub mod signature;

pub use config::{IvfPqIndexConfig, PqIndexConfig};
pub use cursor::{CandidateCursor, EntryLayout, ScanMode};
pub use ivf_pq::{IvfPqIndex, IvfPqIndexTx};
pub use lookup::LookupTable;
pub use pq::{PqIndex, PqIndexTx};
pub use quantizer::{MultiStageQuantizer, SingleStageQuantizer};
pub use signature::Signature;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::constants::training::SAMPLE_MULTIPLIER;
use crate::error::{Result, TesseraError};
use crate::vector::{VectorColumn, VectorValue};

/// Name of the signature store backing the given index.
pub(crate) fn signature_store_name(index_name: &str) -> String {
    format!("tessera_index_{index_name}")
}

/// Draw a deterministic training sample from the column. The sampling
/// fraction is `SAMPLE_MULTIPLIER * num_centroids / count`, clamped to
/// [0, 1]; null vectors never enter the sample. When the draw comes back
/// smaller than `min_required` the whole column is taken instead, and only
/// a column with fewer than `min_required` non-null vectors fails.
pub(crate) fn sample_column(
    column: &dyn VectorColumn,
    num_centroids: usize,
    min_required: usize,
    seed: u64,
) -> Result<Vec<VectorValue>> {
    let count = column.count();
    if count == 0 {
        return Err(TesseraError::InsufficientTrainingData {
            required: min_required,
            actual: 0,
        });
    }
    let fraction = (SAMPLE_MULTIPLIER * num_centroids as f64 / count as f64).clamp(0.0, 1.0);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sample = Vec::new();
    for (_, value) in column.scan() {
        let Some(value) = value else { continue };
        if rng.gen::<f64>() <= fraction {
            sample.push(value);
        }
    }
    debug!(count, fraction, drawn = sample.len(), "training sample drawn");

    if sample.len() < min_required {
        sample = column.scan().filter_map(|(_, v)| v).collect();
    }
    if sample.len() < min_required {
        return Err(TesseraError::InsufficientTrainingData {
            required: min_required,
            actual: sample.len(),
        });
    }
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TupleId;

    struct FixedColumn {
        values: Vec<Option<VectorValue>>,
    }

    impl VectorColumn for FixedColumn {
        fn count(&self) -> u64 {
            self.values.len() as u64
        }

        fn scan(&self) -> Box<dyn Iterator<Item = (TupleId, Option<VectorValue>)> + '_> {
            Box::new(
                self.values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i as TupleId, v.clone())),
            )
        }
    }

    #[test]
    fn test_sample_skips_nulls_and_is_deterministic() {
        let values: Vec<Option<VectorValue>> = (0..100)
            .map(|i| {
                if i % 10 == 0 {
                    None
                } else {
                    Some(VectorValue::from_f32(vec![i as f32, 0.0]))
                }
            })
            .collect();
        let column = FixedColumn { values };

        let a = sample_column(&column, 8, 8, 42).unwrap();
        let b = sample_column(&column, 8, 8, 42).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_sample_small_column_takes_everything() {
        // fraction clamps to 1.0, so every non-null vector is drawn.
        let values: Vec<Option<VectorValue>> = (0..10)
            .map(|i| Some(VectorValue::from_f32(vec![i as f32])))
            .collect();
        let column = FixedColumn { values };

        let sample = sample_column(&column, 512, 10, 1).unwrap();
        assert_eq!(sample.len(), 10);
    }

    #[test]
    fn test_sample_empty_column_errors() {
        let column = FixedColumn { values: vec![] };
        assert!(matches!(
            sample_column(&column, 8, 8, 1),
            Err(TesseraError::InsufficientTrainingData { .. })
        ));
    }
}

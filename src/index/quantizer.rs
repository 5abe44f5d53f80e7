//! Product quantizers: fine subspace codebooks, optionally preceded by a
//! coarse stage for inverted-file placement.
//!
//! Quantizers are trained once per (re)build, serialized into the catalog
//! blob, and deserialized once per transaction. They are never retrained on
//! the write path.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distance::DistanceFunction;
use crate::error::Result;
use crate::index::codebook::Codebook;
use crate::index::signature::Signature;
use crate::vector::VectorValue;

/// A plain product quantizer: one codebook per subspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleStageQuantizer {
    codebooks: Vec<Codebook>,
}

impl SingleStageQuantizer {
    /// Train one codebook per subspace on the given sample. `distance` is
    /// the full-width function; each codebook trains under its
    /// subspace-width reshape. Codebooks train in parallel, each under a
    /// seed derived from the configured one.
    pub fn train(
        sample: &[VectorValue],
        distance: DistanceFunction,
        num_subspaces: usize,
        num_centroids: usize,
        seed: u64,
    ) -> Result<Self> {
        let width = distance.dimensionality() / num_subspaces;
        let subspace_distance = distance.reshape(width);

        let codebooks = (0..num_subspaces)
            .into_par_iter()
            .map(|subspace| {
                let slice: Vec<Vec<f32>> = sample
                    .iter()
                    .map(|v| v.subvector(subspace * width, width))
                    .collect();
                Codebook::train(
                    &slice,
                    num_centroids,
                    subspace_distance,
                    seed.wrapping_add(subspace as u64),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { codebooks })
    }

    /// Number of subspaces.
    pub fn num_subspaces(&self) -> usize {
        self.codebooks.len()
    }

    /// Width of each subspace.
    pub fn subspace_width(&self) -> usize {
        self.codebooks[0].dimensionality()
    }

    /// Number of centroids per codebook.
    pub fn num_centroids(&self) -> usize {
        self.codebooks[0].len()
    }

    /// The codebook of one subspace.
    pub fn codebook(&self, subspace: usize) -> &Codebook {
        &self.codebooks[subspace]
    }

    /// Quantize a vector into its signature.
    pub fn quantize(&self, v: &VectorValue) -> Signature {
        let width = self.subspace_width();
        let cells = self
            .codebooks
            .iter()
            .enumerate()
            .map(|(subspace, codebook)| codebook.quantize(&v.subvector(subspace * width, width)))
            .collect::<Vec<u16>>();
        Signature::new(cells)
    }
}

/// A two-stage quantizer for IVFPQ: a coarse codebook over full-width
/// vectors assigns each tuple to an inverted-list cell, a fine product
/// quantizer produces the signature stored inside the cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStageQuantizer {
    coarse: Codebook,
    fine: SingleStageQuantizer,
}

impl MultiStageQuantizer {
    /// Train both stages on the same sample.
    pub fn train(
        sample: &[VectorValue],
        distance: DistanceFunction,
        num_coarse_centroids: usize,
        num_subspaces: usize,
        num_centroids: usize,
        seed: u64,
    ) -> Result<Self> {
        let full: Vec<Vec<f32>> = sample.iter().map(|v| v.as_f32().into_owned()).collect();
        let coarse = Codebook::train(&full, num_coarse_centroids, distance, seed)?;
        let fine = SingleStageQuantizer::train(sample, distance, num_subspaces, num_centroids, seed)?;
        Ok(Self { coarse, fine })
    }

    /// The coarse codebook.
    pub fn coarse(&self) -> &Codebook {
        &self.coarse
    }

    /// The fine product quantizer.
    pub fn fine(&self) -> &SingleStageQuantizer {
        &self.fine
    }

    /// Quantize a vector into its coarse cell and fine signature.
    pub fn quantize(&self, v: &VectorValue) -> (u16, Signature) {
        let cell = self.coarse.quantize(&v.as_f32());
        (cell, self.fine.quantize(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Metric;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample(n: usize, dim: usize, seed: u64) -> Vec<VectorValue> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                VectorValue::from_f32((0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
            })
            .collect()
    }

    #[test]
    fn test_single_stage_shape() {
        let sample = sample(100, 8, 3);
        let distance = DistanceFunction::new(Metric::Euclidean, 8);
        let quantizer = SingleStageQuantizer::train(&sample, distance, 4, 4, 42).unwrap();

        assert_eq!(quantizer.num_subspaces(), 4);
        assert_eq!(quantizer.subspace_width(), 2);
        assert_eq!(quantizer.num_centroids(), 4);

        let signature = quantizer.quantize(&sample[0]);
        assert_eq!(signature.len(), 4);
        assert!(signature.cells().iter().all(|&c| c < 4));
    }

    #[test]
    fn test_training_deterministic() {
        let sample = sample(100, 8, 3);
        let distance = DistanceFunction::new(Metric::Euclidean, 8);
        let a = SingleStageQuantizer::train(&sample, distance, 4, 4, 42).unwrap();
        let b = SingleStageQuantizer::train(&sample, distance, 4, 4, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multi_stage_quantize() {
        let sample = sample(120, 8, 5);
        let distance = DistanceFunction::new(Metric::Euclidean, 8);
        let quantizer = MultiStageQuantizer::train(&sample, distance, 8, 4, 4, 42).unwrap();

        let (cell, signature) = quantizer.quantize(&sample[3]);
        assert!((cell as usize) < 8);
        assert_eq!(signature.len(), 4);
    }

    #[test]
    fn test_quantizer_blob_round_trip() {
        let sample = sample(80, 8, 9);
        let distance = DistanceFunction::new(Metric::Euclidean, 8);
        let quantizer = MultiStageQuantizer::train(&sample, distance, 4, 4, 4, 42).unwrap();

        let bytes = bincode::serialize(&quantizer).unwrap();
        let decoded: MultiStageQuantizer = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, quantizer);
    }
}

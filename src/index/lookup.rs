//! Per-query lookup tables for asymmetric distance evaluation.
//!
//! For one query vector the table holds the raw sub-distance between each
//! query subvector and every centroid of that subspace. Evaluating a stored
//! signature is then one table access per subspace. The result is a biased
//! ranking signal, not an exact distance; callers re-rank.

use crate::distance::Metric;
use crate::error::{Result, TesseraError};
use crate::index::quantizer::SingleStageQuantizer;
use crate::index::signature::Signature;

/// How per-subspace entries combine into one approximate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combination {
    /// Plain sum of entries (Manhattan).
    Sum,
    /// Square the entries, sum, take the square root (Euclidean; Cosine is
    /// routed through this family as an approximation).
    SqrtOfSquares,
    /// Square the entries and sum (squared Euclidean).
    SumOfSquares,
}

impl Combination {
    fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::Manhattan => Combination::Sum,
            Metric::Euclidean | Metric::Cosine => Combination::SqrtOfSquares,
            Metric::SquaredEuclidean => Combination::SumOfSquares,
        }
    }
}

/// A `num_subspaces x num_centroids` matrix of raw sub-distances for one
/// query. Lives only as long as the cursor it serves.
pub struct LookupTable {
    // Flat row-major layout, one row per subspace.
    entries: Vec<f32>,
    num_centroids: usize,
    combination: Combination,
}

impl LookupTable {
    /// Precompute the table for `query` against all fine codebooks.
    pub fn new(query: &[f32], quantizer: &SingleStageQuantizer) -> Self {
        let num_subspaces = quantizer.num_subspaces();
        let num_centroids = quantizer.num_centroids();
        let width = quantizer.subspace_width();
        let combination = Combination::for_metric(quantizer.codebook(0).distance().metric());

        let mut entries = Vec::with_capacity(num_subspaces * num_centroids);
        for subspace in 0..num_subspaces {
            let codebook = quantizer.codebook(subspace);
            let sub = &query[subspace * width..(subspace + 1) * width];
            for id in 0..num_centroids {
                entries.push(codebook.distance_from(sub, id));
            }
        }

        Self {
            entries,
            num_centroids,
            combination,
        }
    }

    /// Approximate distance between the query and the vector a signature
    /// stands for. One table access per subspace. A signature referencing
    /// a cell the table has no row or column for is `DataCorruption`.
    #[inline]
    pub fn approximate_distance(&self, signature: &Signature) -> Result<f32> {
        let mut sum = 0.0f32;
        match self.combination {
            Combination::Sum => {
                for (subspace, &cell) in signature.cells().iter().enumerate() {
                    sum += self.entry(subspace, cell)?;
                }
                Ok(sum)
            }
            Combination::SqrtOfSquares => {
                for (subspace, &cell) in signature.cells().iter().enumerate() {
                    let e = self.entry(subspace, cell)?;
                    sum += e * e;
                }
                Ok(sum.sqrt())
            }
            Combination::SumOfSquares => {
                for (subspace, &cell) in signature.cells().iter().enumerate() {
                    let e = self.entry(subspace, cell)?;
                    sum += e * e;
                }
                Ok(sum)
            }
        }
    }

    #[inline]
    fn entry(&self, subspace: usize, cell: u16) -> Result<f32> {
        if cell as usize >= self.num_centroids {
            return Err(TesseraError::data_corruption(format!(
                "signature cell {cell} exceeds {} centroids",
                self.num_centroids
            )));
        }
        self.entries
            .get(subspace * self.num_centroids + cell as usize)
            .copied()
            .ok_or_else(|| {
                TesseraError::data_corruption(format!(
                    "signature subspace {subspace} exceeds the lookup table"
                ))
            })
    }
}

//! A trained codebook: centroids plus the distance that shaped them.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceFunction;
use crate::error::Result;
use crate::kmeans::KMeansClusterer;

/// Centroids of one quantization stage. Fine codebooks span a subspace,
/// the coarse codebook spans the full vector width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebook {
    distance: DistanceFunction,
    centroids: Vec<Vec<f32>>,
}

impl Codebook {
    /// Train a codebook of `k` centroids on the given sample.
    pub fn train(sample: &[Vec<f32>], k: usize, distance: DistanceFunction, seed: u64) -> Result<Self> {
        let centroids = KMeansClusterer::new(k, distance, seed).cluster(sample)?;
        Ok(Self {
            distance,
            centroids,
        })
    }

    /// Number of centroids.
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    /// True when the codebook holds no centroids.
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Width of each centroid.
    pub fn dimensionality(&self) -> usize {
        self.distance.dimensionality()
    }

    /// The distance function the codebook was trained under.
    pub fn distance(&self) -> DistanceFunction {
        self.distance
    }

    /// Centroid with the given id.
    pub fn centroid(&self, id: usize) -> &[f32] {
        &self.centroids[id]
    }

    /// Id of the centroid nearest to `v`.
    pub fn quantize(&self, v: &[f32]) -> u16 {
        let mut best = 0usize;
        let mut best_distance = f32::INFINITY;
        for (id, centroid) in self.centroids.iter().enumerate() {
            let d = self.distance.compute(v, centroid);
            if d < best_distance {
                best_distance = d;
                best = id;
            }
        }
        best as u16
    }

    /// Distance from `v` to the centroid with the given id.
    pub fn distance_from(&self, v: &[f32], id: usize) -> f32 {
        self.distance.compute(v, &self.centroids[id])
    }
}

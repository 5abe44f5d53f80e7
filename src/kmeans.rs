//! Seeded Lloyd's k-means for codebook training.
//!
//! All clustering is deterministic: the same seed and sample produce
//! bit-identical centroids. Distances during assignment use the metric the
//! codebook is trained for, so the same trainer serves fine subspace
//! codebooks and the full-width coarse codebook.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::constants::kmeans::MAX_ITERATIONS;
use crate::distance::DistanceFunction;
use crate::error::{Result, TesseraError};

/// Lloyd's k-means with seeded k-means++ initialization.
pub struct KMeansClusterer {
    k: usize,
    distance: DistanceFunction,
    seed: u64,
    max_iterations: usize,
}

impl KMeansClusterer {
    /// Create a clusterer producing `k` centroids under the given distance.
    pub fn new(k: usize, distance: DistanceFunction, seed: u64) -> Self {
        Self {
            k,
            distance,
            seed,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Override the iteration cap. Mainly useful in tests.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Cluster the sample and return the `k` centroids.
    ///
    /// Converges when no assignment changes and no cluster is empty, or
    /// after the iteration cap. Empty clusters are reseeded from the point
    /// farthest from its assigned centroid.
    pub fn cluster(&self, sample: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if sample.len() < self.k {
            return Err(TesseraError::InsufficientTrainingData {
                required: self.k,
                actual: sample.len(),
            });
        }

        let dim = self.distance.dimensionality();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init_plus_plus(sample, &mut rng);
        let mut assignments = vec![usize::MAX; sample.len()];

        for _iter in 0..self.max_iterations {
            let new_assignments = self.assign(sample, &centroids);
            let changed = new_assignments != assignments;
            assignments = new_assignments;

            let mut counts = vec![0usize; self.k];
            let mut sums = vec![vec![0.0f32; dim]; self.k];
            for (v, &a) in sample.iter().zip(assignments.iter()) {
                counts[a] += 1;
                for (acc, &x) in sums[a].iter_mut().zip(v.iter()) {
                    *acc += x;
                }
            }

            for c in 0..self.k {
                if counts[c] == 0 {
                    continue;
                }
                let inv = 1.0 / counts[c] as f32;
                for (dst, &acc) in centroids[c].iter_mut().zip(sums[c].iter()) {
                    *dst = acc * inv;
                }
            }
            let reseeded = self.reseed_empty(sample, &mut centroids, &assignments, &counts);

            if !changed && !reseeded {
                break;
            }
        }

        Ok(centroids)
    }

    /// k-means++ seeding: each new centroid is drawn with probability
    /// proportional to its squared distance from the nearest chosen one.
    fn init_plus_plus(&self, sample: &[Vec<f32>], rng: &mut StdRng) -> Vec<Vec<f32>> {
        let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(self.k);
        centroids.push(sample[rng.gen_range(0..sample.len())].clone());

        let mut nearest: Vec<f32> = sample
            .iter()
            .map(|v| {
                let d = self.distance.compute(v, &centroids[0]);
                d * d
            })
            .collect();

        while centroids.len() < self.k {
            let total: f64 = nearest.iter().map(|&d| d as f64).sum();
            let chosen = if total == 0.0 {
                // All remaining points coincide with a centroid.
                rng.gen_range(0..sample.len())
            } else {
                let mut r = rng.gen_range(0.0..total);
                let mut idx = sample.len() - 1;
                for (i, &d) in nearest.iter().enumerate() {
                    r -= d as f64;
                    if r <= 0.0 {
                        idx = i;
                        break;
                    }
                }
                idx
            };

            let newest = sample[chosen].clone();
            for (slot, v) in nearest.iter_mut().zip(sample.iter()) {
                let d = self.distance.compute(v, &newest);
                *slot = slot.min(d * d);
            }
            centroids.push(newest);
        }

        centroids
    }

    /// Assign each sample point to its nearest centroid.
    fn assign(&self, sample: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<usize> {
        sample
            .par_iter()
            .map(|v| {
                centroids
                    .iter()
                    .enumerate()
                    .map(|(idx, c)| (idx, self.distance.compute(v, c)))
                    .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(idx, _)| idx)
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Reseed every empty cluster by stealing the point farthest from its
    /// assigned centroid. Each steal takes a different point, so two
    /// clusters emptying in the same iteration get distinct centroids.
    fn reseed_empty(
        &self,
        sample: &[Vec<f32>],
        centroids: &mut [Vec<f32>],
        assignments: &[usize],
        counts: &[usize],
    ) -> bool {
        let mut stolen: Vec<usize> = Vec::new();
        for c in 0..self.k {
            if counts[c] != 0 {
                continue;
            }
            let farthest = self.farthest_point(sample, centroids, assignments, &stolen);
            centroids[c] = sample[farthest].clone();
            stolen.push(farthest);
        }
        !stolen.is_empty()
    }

    /// Index of the sample point farthest from its assigned centroid,
    /// skipping points already stolen by an earlier reseed.
    fn farthest_point(
        &self,
        sample: &[Vec<f32>],
        centroids: &[Vec<f32>],
        assignments: &[usize],
        stolen: &[usize],
    ) -> usize {
        sample
            .iter()
            .zip(assignments.iter())
            .enumerate()
            .filter(|(i, _)| !stolen.contains(i))
            .map(|(i, (v, &a))| (i, self.distance.compute(v, &centroids[a])))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Metric;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_sample(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    #[test]
    fn test_cluster_basic() {
        let sample = random_sample(300, 8, 7);
        let distance = DistanceFunction::new(Metric::Euclidean, 8);
        let clusterer = KMeansClusterer::new(5, distance, 42);

        let centroids = clusterer.cluster(&sample).unwrap();
        assert_eq!(centroids.len(), 5);
        for c in &centroids {
            assert_eq!(c.len(), 8);
            assert!(c.iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn test_cluster_deterministic() {
        let sample = random_sample(200, 4, 11);
        let distance = DistanceFunction::new(Metric::Euclidean, 4);

        let a = KMeansClusterer::new(8, distance, 42)
            .cluster(&sample)
            .unwrap();
        let b = KMeansClusterer::new(8, distance, 42)
            .cluster(&sample)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cluster_rejects_small_sample() {
        let sample = random_sample(3, 4, 1);
        let distance = DistanceFunction::new(Metric::Euclidean, 4);
        let err = KMeansClusterer::new(8, distance, 42)
            .cluster(&sample)
            .unwrap_err();
        assert!(matches!(
            err,
            TesseraError::InsufficientTrainingData {
                required: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_empty_clusters_reseed_distinct_points() {
        let distance = DistanceFunction::new(Metric::Euclidean, 1);
        let clusterer = KMeansClusterer::new(4, distance, 42);

        let sample = vec![vec![0.0], vec![0.2], vec![5.0], vec![9.0]];
        let mut centroids = vec![vec![0.1], vec![6.0], vec![50.0], vec![60.0]];
        let assignments = vec![0, 0, 1, 1];
        let counts = vec![2, 2, 0, 0];

        assert!(clusterer.reseed_empty(&sample, &mut centroids, &assignments, &counts));
        // Farthest point first, then the next-farthest; never the same
        // point twice.
        assert_eq!(centroids[2], vec![9.0]);
        assert_eq!(centroids[3], vec![5.0]);
        assert_ne!(centroids[2], centroids[3]);
    }

    #[test]
    fn test_cluster_separates_obvious_groups() {
        // Two tight groups far apart; k=2 must place one centroid near each.
        let mut sample = Vec::new();
        for i in 0..50 {
            sample.push(vec![0.0 + (i as f32) * 0.001, 0.0]);
            sample.push(vec![100.0 + (i as f32) * 0.001, 100.0]);
        }
        let distance = DistanceFunction::new(Metric::Euclidean, 2);
        let centroids = KMeansClusterer::new(2, distance, 42)
            .cluster(&sample)
            .unwrap();

        let near_origin = centroids.iter().any(|c| c[0] < 50.0 && c[1] < 50.0);
        let near_far = centroids.iter().any(|c| c[0] > 50.0 && c[1] > 50.0);
        assert!(near_origin && near_far);
    }
}

//! Distance functions for vector comparison.
//!
//! Metrics are resolved by name into a [`DistanceFunction`] bound to a
//! dimensionality. Each metric has a scalar reference implementation and a
//! SIMD fast path; the public entry points select the fastest available
//! implementation at runtime.

pub mod scalar;
pub mod simd;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

/// Distance metrics supported by the PQ index family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Manhattan (L1) distance: sum(|a[i] - b[i]|)
    Manhattan,
    /// Euclidean (L2) distance: sqrt(sum((a[i] - b[i])^2))
    Euclidean,
    /// Squared Euclidean distance: sum((a[i] - b[i])^2)
    /// Same ordering as Euclidean without the sqrt.
    SquaredEuclidean,
    /// Cosine distance: 1 - cosine_similarity(a, b)
    Cosine,
}

impl Metric {
    /// All metrics the index family accepts.
    pub const SUPPORTED: [Metric; 4] = [
        Metric::Manhattan,
        Metric::Euclidean,
        Metric::SquaredEuclidean,
        Metric::Cosine,
    ];

    /// Resolve a metric by its registered name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "manhattan" | "l1" => Ok(Metric::Manhattan),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "squaredeuclidean" | "l2squared" => Ok(Metric::SquaredEuclidean),
            "cosine" => Ok(Metric::Cosine),
            other => Err(TesseraError::UnsupportedDistance(other.to_string())),
        }
    }

    /// Canonical name of this metric.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Manhattan => "manhattan",
            Metric::Euclidean => "euclidean",
            Metric::SquaredEuclidean => "squaredeuclidean",
            Metric::Cosine => "cosine",
        }
    }

    /// Compute the distance between two vectors using this metric.
    ///
    /// # Panics
    /// Panics if the vectors have different dimensions.
    #[inline]
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Manhattan => simd::manhattan_distance(a, b),
            Metric::Euclidean => simd::euclidean_distance(a, b),
            Metric::SquaredEuclidean => simd::euclidean_distance_squared(a, b),
            Metric::Cosine => scalar::cosine_distance(a, b),
        }
    }
}

/// A metric bound to a fixed dimensionality. Indexes resolve one of these
/// per transaction and reshape it for subspace-width comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceFunction {
    metric: Metric,
    dimensionality: usize,
}

impl DistanceFunction {
    /// Resolve a distance function by metric name for the given
    /// dimensionality.
    pub fn resolve(name: &str, dimensionality: usize) -> Result<Self> {
        Ok(Self {
            metric: Metric::from_name(name)?,
            dimensionality,
        })
    }

    /// Bind a metric to a dimensionality directly.
    pub fn new(metric: Metric, dimensionality: usize) -> Self {
        Self {
            metric,
            dimensionality,
        }
    }

    /// The underlying metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The dimensionality this function operates on.
    pub fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// The same metric bound to a different dimensionality. Used to derive
    /// subspace-width functions from the full-width one.
    pub fn reshape(&self, dimensionality: usize) -> Self {
        Self {
            metric: self.metric,
            dimensionality,
        }
    }

    /// Compute the distance between two vectors.
    ///
    /// # Panics
    /// Panics if either vector does not match the bound dimensionality.
    #[inline]
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), self.dimensionality);
        debug_assert_eq!(b.len(), self.dimensionality);
        self.metric.compute(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_euclidean() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((Metric::Euclidean.compute(&a, &b) - 5.0).abs() < 1e-5);
        assert!((Metric::SquaredEuclidean.compute(&a, &b) - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_metric_manhattan() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((Metric::Manhattan.compute(&a, &b) - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_resolve_by_name() {
        assert_eq!(Metric::from_name("l2").unwrap(), Metric::Euclidean);
        assert_eq!(Metric::from_name("cosine").unwrap(), Metric::Cosine);
        assert!(matches!(
            Metric::from_name("chebyshev"),
            Err(TesseraError::UnsupportedDistance(_))
        ));
    }

    #[test]
    fn test_reshape_keeps_metric() {
        let f = DistanceFunction::resolve("euclidean", 128).unwrap();
        let sub = f.reshape(16);
        assert_eq!(sub.metric(), Metric::Euclidean);
        assert_eq!(sub.dimensionality(), 16);
    }

    #[test]
    fn test_name_round_trip() {
        for metric in Metric::SUPPORTED {
            assert_eq!(Metric::from_name(metric.name()).unwrap(), metric);
        }
    }
}

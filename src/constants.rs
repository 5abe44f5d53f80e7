//! Named constants for configuration values.
//!
//! This module centralizes defaults and limits used throughout the codebase,
//! making them easier to find, document, and tune.

/// Constants for product quantization.
pub mod pq {
    /// Default number of fine centroids per subspace codebook.
    pub const DEFAULT_CENTROIDS: usize = 512;

    /// Default number of subspaces a vector is split into.
    pub const DEFAULT_SUBSPACES: usize = 8;

    /// Upper bound for the subspace-count search. Requested counts are
    /// adjusted to the nearest divisor of the dimensionality, searching
    /// upward to this limit before falling back downward.
    pub const MAX_SUBSPACES: usize = 32;
}

/// Constants for the inverted-file layer.
pub mod ivf {
    /// Default number of coarse centroids (inverted-list cells).
    pub const DEFAULT_COARSE_CENTROIDS: usize = 1024;

    /// Divisor for the default probe depth: `max(1, coarse / NPROBE_DIVISOR)`
    /// cells are scanned when no explicit nprobe is configured.
    pub const NPROBE_DIVISOR: usize = 32;
}

/// Constants for k-means clustering.
pub mod kmeans {
    /// Hard cap on Lloyd iterations. Training stops earlier once no
    /// assignment changes and no cluster is empty.
    pub const MAX_ITERATIONS: usize = 250;
}

/// Constants for training-sample selection during build and rebuild.
pub mod training {
    /// Multiplier for the sampling fraction: `MULTIPLIER * num_centroids /
    /// column_count`, clamped to [0, 1].
    pub const SAMPLE_MULTIPLIER: f64 = 3.0;
}

/// Constants for the query cost model.
pub mod cost {
    /// Estimated cost of reading one signature component from disk.
    pub const IO_PER_COMPONENT: f64 = 0.0002;

    /// Estimated cost of one lookup-table access.
    pub const CPU_PER_LOOKUP: f64 = 1e-5;

    /// Accuracy estimate for PQ scans (full signature scan, no probing).
    pub const ACCURACY_PQ: f64 = 0.2;

    /// Accuracy estimate for IVFPQ scans (probing skips cells entirely).
    pub const ACCURACY_IVFPQ: f64 = 0.1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fit_in_u16() {
        assert!(pq::DEFAULT_CENTROIDS <= u16::MAX as usize);
        assert!(ivf::DEFAULT_COARSE_CENTROIDS <= u16::MAX as usize);
    }

    #[test]
    fn test_accuracy_below_exact() {
        assert!(cost::ACCURACY_PQ < 1.0);
        assert!(cost::ACCURACY_IVFPQ < cost::ACCURACY_PQ);
    }
}

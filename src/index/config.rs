//! Configuration for the PQ index family.
//!
//! Configurations are validated at construction and immutable afterwards;
//! a rebuild replaces the persisted configuration wholesale.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{ivf, pq};
use crate::distance::Metric;
use crate::error::{Result, TesseraError};
use crate::vector::ElementKind;

/// Parameter key for the distance metric name.
pub const KEY_DISTANCE: &str = "distance";
/// Parameter key for the number of fine centroids per subspace.
pub const KEY_NUM_CENTROIDS: &str = "num_centroids";
/// Parameter key for the number of subspaces.
pub const KEY_NUM_SUBSPACES: &str = "num_subspaces";
/// Parameter key for the number of coarse centroids (IVFPQ only).
pub const KEY_NUM_COARSE_CENTROIDS: &str = "num_coarse_centroids";
/// Parameter key for the training seed.
pub const KEY_SEED: &str = "seed";
/// Parameter key for the probe depth override (IVFPQ only).
pub const KEY_NPROBE: &str = "nprobe";

/// Configuration of a plain PQ index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PqIndexConfig {
    /// Distance metric the index is built for.
    pub metric: Metric,
    /// Number of fine centroids per subspace codebook.
    pub num_centroids: usize,
    /// Requested number of subspaces. The effective count is the nearest
    /// divisor of the column dimensionality, see [`subspace_count_for`].
    pub num_subspaces: usize,
    /// Seed for deterministic training.
    pub seed: u64,
    /// Element kind of the indexed column.
    pub element: ElementKind,
}

impl PqIndexConfig {
    /// Create a validated configuration.
    pub fn new(
        metric: Metric,
        num_centroids: usize,
        num_subspaces: usize,
        seed: u64,
        element: ElementKind,
    ) -> Result<Self> {
        validate_count("num_centroids", num_centroids)?;
        validate_count("num_subspaces", num_subspaces)?;
        Ok(Self {
            metric,
            num_centroids,
            num_subspaces,
            seed,
            element,
        })
    }

    /// Build a configuration from string parameters, applying defaults for
    /// absent keys.
    pub fn from_params(params: &HashMap<String, String>, element: ElementKind) -> Result<Self> {
        Self::new(
            parse_metric(params)?,
            parse_count(params, KEY_NUM_CENTROIDS, pq::DEFAULT_CENTROIDS)?,
            parse_count(params, KEY_NUM_SUBSPACES, pq::DEFAULT_SUBSPACES)?,
            parse_seed(params)?,
            element,
        )
    }

    /// Effective subspace count for a column of dimension `d`.
    pub fn subspace_count_for(&self, d: usize) -> Result<usize> {
        subspace_count_for(self.num_subspaces, d)
    }
}

/// Configuration of an IVFPQ index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvfPqIndexConfig {
    /// Distance metric the index is built for.
    pub metric: Metric,
    /// Number of coarse centroids (inverted-list cells).
    pub num_coarse_centroids: usize,
    /// Number of fine centroids per subspace codebook.
    pub num_centroids: usize,
    /// Requested number of subspaces.
    pub num_subspaces: usize,
    /// Seed for deterministic training.
    pub seed: u64,
    /// Element kind of the indexed column.
    pub element: ElementKind,
    /// Probe depth override. When absent, `max(1, coarse / 32)` cells are
    /// probed.
    pub nprobe: Option<usize>,
}

impl IvfPqIndexConfig {
    /// Create a validated configuration.
    pub fn new(
        metric: Metric,
        num_coarse_centroids: usize,
        num_centroids: usize,
        num_subspaces: usize,
        seed: u64,
        element: ElementKind,
        nprobe: Option<usize>,
    ) -> Result<Self> {
        validate_count("num_coarse_centroids", num_coarse_centroids)?;
        validate_count("num_centroids", num_centroids)?;
        validate_count("num_subspaces", num_subspaces)?;
        if let Some(n) = nprobe {
            if n == 0 {
                return Err(TesseraError::invalid_config("nprobe must be positive"));
            }
        }
        Ok(Self {
            metric,
            num_coarse_centroids,
            num_centroids,
            num_subspaces,
            seed,
            element,
            nprobe,
        })
    }

    /// Build a configuration from string parameters, applying defaults for
    /// absent keys.
    pub fn from_params(params: &HashMap<String, String>, element: ElementKind) -> Result<Self> {
        let nprobe = match params.get(KEY_NPROBE) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                TesseraError::invalid_config(format!("invalid value for '{KEY_NPROBE}': {raw}"))
            })?),
            None => None,
        };
        Self::new(
            parse_metric(params)?,
            parse_count(params, KEY_NUM_COARSE_CENTROIDS, ivf::DEFAULT_COARSE_CENTROIDS)?,
            parse_count(params, KEY_NUM_CENTROIDS, pq::DEFAULT_CENTROIDS)?,
            parse_count(params, KEY_NUM_SUBSPACES, pq::DEFAULT_SUBSPACES)?,
            parse_seed(params)?,
            element,
            nprobe,
        )
    }

    /// Number of coarse cells probed per query.
    pub fn effective_nprobe(&self) -> usize {
        self.nprobe
            .unwrap_or_else(|| (self.num_coarse_centroids / ivf::NPROBE_DIVISOR).max(1))
    }

    /// Effective subspace count for a column of dimension `d`.
    pub fn subspace_count_for(&self, d: usize) -> Result<usize> {
        subspace_count_for(self.num_subspaces, d)
    }
}

/// Adjust a requested subspace count to one that divides the column
/// dimension `d`: search upward to the subspace limit first, then downward
/// to 1. Vectors are never truncated or padded to fit.
pub fn subspace_count_for(requested: usize, d: usize) -> Result<usize> {
    if d == 0 {
        return Err(TesseraError::invalid_config(
            "column dimensionality must be positive",
        ));
    }
    for n in requested..=pq::MAX_SUBSPACES {
        if d % n == 0 {
            return Ok(n);
        }
    }
    for n in (1..=requested).rev() {
        if d % n == 0 {
            return Ok(n);
        }
    }
    // d % 1 == 0 always holds, so this is unreachable for valid inputs.
    Err(TesseraError::invalid_config(format!(
        "no subspace count for dimensionality {d}"
    )))
}

fn validate_count(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(TesseraError::invalid_config(format!(
            "{name} must be positive"
        )));
    }
    if value > u16::MAX as usize {
        return Err(TesseraError::invalid_config(format!(
            "{name} must not exceed {}",
            u16::MAX
        )));
    }
    Ok(())
}

fn parse_metric(params: &HashMap<String, String>) -> Result<Metric> {
    let name = params
        .get(KEY_DISTANCE)
        .ok_or_else(|| TesseraError::invalid_config(format!("missing '{KEY_DISTANCE}'")))?;
    Metric::from_name(name)
}

fn parse_count(params: &HashMap<String, String>, key: &str, default: usize) -> Result<usize> {
    match params.get(key) {
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            TesseraError::invalid_config(format!("invalid value for '{key}': {raw}"))
        }),
        None => Ok(default),
    }
}

fn parse_seed(params: &HashMap<String, String>) -> Result<u64> {
    match params.get(KEY_SEED) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            TesseraError::invalid_config(format!("invalid value for '{KEY_SEED}': {raw}"))
        }),
        // Unseeded configs still train deterministically once persisted.
        None => Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subspace_divisor_exact() {
        assert_eq!(subspace_count_for(4, 8).unwrap(), 4);
        assert_eq!(subspace_count_for(8, 128).unwrap(), 8);
    }

    #[test]
    fn test_subspace_divisor_searches_up_then_down() {
        // d=10, requested 4: upward 4,5 -> 5 divides 10.
        assert_eq!(subspace_count_for(4, 10).unwrap(), 5);
        // d=7 (prime, > MAX_SUBSPACES range irrelevant): 7 divides, found upward.
        assert_eq!(subspace_count_for(4, 7).unwrap(), 7);
        // d=3, requested 8: nothing upward in 8..=32 divides 3 except... 3 < 8,
        // so the downward pass lands on 3.
        assert_eq!(subspace_count_for(8, 3).unwrap(), 3);
    }

    #[test]
    fn test_config_rejects_bad_counts() {
        assert!(PqIndexConfig::new(Metric::Euclidean, 0, 8, 42, ElementKind::F32).is_err());
        assert!(PqIndexConfig::new(Metric::Euclidean, 70_000, 8, 42, ElementKind::F32).is_err());
        assert!(IvfPqIndexConfig::new(
            Metric::Euclidean,
            1024,
            512,
            8,
            42,
            ElementKind::F32,
            Some(0)
        )
        .is_err());
    }

    #[test]
    fn test_from_params_defaults() {
        let mut params = HashMap::new();
        params.insert(KEY_DISTANCE.to_string(), "euclidean".to_string());
        params.insert(KEY_SEED.to_string(), "42".to_string());

        let config = IvfPqIndexConfig::from_params(&params, ElementKind::F32).unwrap();
        assert_eq!(config.num_centroids, pq::DEFAULT_CENTROIDS);
        assert_eq!(config.num_coarse_centroids, ivf::DEFAULT_COARSE_CENTROIDS);
        assert_eq!(config.num_subspaces, pq::DEFAULT_SUBSPACES);
        assert_eq!(config.seed, 42);
        assert_eq!(config.effective_nprobe(), 1024 / ivf::NPROBE_DIVISOR);
    }

    #[test]
    fn test_nprobe_override() {
        let config = IvfPqIndexConfig::new(
            Metric::Euclidean,
            1024,
            512,
            8,
            42,
            ElementKind::F32,
            Some(128),
        )
        .unwrap();
        assert_eq!(config.effective_nprobe(), 128);
    }

    #[test]
    fn test_from_params_rejects_unknown_metric() {
        let mut params = HashMap::new();
        params.insert(KEY_DISTANCE.to_string(), "hamming".to_string());
        assert!(matches!(
            PqIndexConfig::from_params(&params, ElementKind::F32),
            Err(TesseraError::UnsupportedDistance(_))
        ));
    }
}

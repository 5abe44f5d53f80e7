//! Query-engine surface: predicates, the cost model, and partitioning.

use crate::distance::Metric;
use crate::vector::VectorValue;

/// Predicates the query planner may offer to an index.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Rank every tuple of a column by distance to a query vector.
    Proximity(ProximityScan),
    /// A boolean comparison on a column. PQ indexes never serve these.
    Comparison {
        /// Column the comparison applies to.
        column: String,
    },
}

/// A full proximity scan over one vector column.
#[derive(Debug, Clone)]
pub struct ProximityScan {
    /// The column being ranked.
    pub column: String,
    /// The distance metric requested by the query.
    pub metric: Metric,
    /// The query vector.
    pub query: VectorValue,
}

/// Estimated cost of serving a predicate. `accuracy` is strictly below 1.0
/// for approximate indexes; the planner weighs it against exact scans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    /// Estimated I/O cost.
    pub io: f64,
    /// Estimated CPU cost.
    pub cpu: f64,
    /// Expected fraction of true neighbors in the result.
    pub accuracy: f64,
}

impl Cost {
    /// Zero cost.
    pub const ZERO: Cost = Cost {
        io: 0.0,
        cpu: 0.0,
        accuracy: 0.0,
    };

    /// Sentinel for predicates an index cannot process at all.
    pub const INVALID: Cost = Cost {
        io: f64::INFINITY,
        cpu: f64::INFINITY,
        accuracy: 0.0,
    };

    /// Scale the io/cpu components by a per-tuple count.
    pub fn scaled(&self, n: f64) -> Cost {
        Cost {
            io: self.io * n,
            cpu: self.cpu * n,
            accuracy: self.accuracy,
        }
    }
}

/// Marker for indexes whose scans cannot be split into partitions.
/// Implementors answer partitioned cursor requests with an error.
pub trait NotPartitionable {}

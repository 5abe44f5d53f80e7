//! tessera: a product-quantization vector index subsystem for an embedded
//! analytical database.
//!
//! Vectors are compressed into short signatures by seeded k-means
//! codebooks; queries rank candidates with a per-query lookup table instead
//! of touching the raw vectors. Two index types are provided:
//!
//! - **PQ** ([`PqIndex`]): a full scan over the signature store.
//! - **IVFPQ** ([`IvfPqIndex`]): adds a coarse codebook whose cells key an
//!   inverted file, so queries only probe the nearest cells.
//!
//! Both yield approximate distances in scan order; callers re-rank with
//! exact distances.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera::index::{PqIndex, PqIndexConfig};
//! use tessera::predicate::{Predicate, ProximityScan};
//! use tessera::store::Environment;
//! use tessera::vector::{ElementKind, VectorColumn, VectorValue};
//! use tessera::{Metric, TupleId};
//!
//! struct Column(Vec<VectorValue>);
//!
//! impl VectorColumn for Column {
//!     fn count(&self) -> u64 {
//!         self.0.len() as u64
//!     }
//!     fn scan(&self) -> Box<dyn Iterator<Item = (TupleId, Option<VectorValue>)> + '_> {
//!         Box::new(
//!             self.0
//!                 .iter()
//!                 .enumerate()
//!                 .map(|(i, v)| (i as TupleId, Some(v.clone()))),
//!         )
//!     }
//! }
//!
//! # fn main() -> tessera::Result<()> {
//! let column = Column(
//!     (0..64)
//!         .map(|i| VectorValue::from_f32(vec![i as f32, (64 - i) as f32]))
//!         .collect(),
//! );
//!
//! let env = Arc::new(Environment::new());
//! let config = PqIndexConfig::new(Metric::Euclidean, 4, 2, 42, ElementKind::F32)?;
//! let index = PqIndex::create(Arc::clone(&env), "demo", "features", config)?;
//! index.rebuild(&column)?;
//!
//! let predicate = Predicate::Proximity(ProximityScan {
//!     column: "features".into(),
//!     metric: Metric::Euclidean,
//!     query: VectorValue::from_f32(vec![3.0, 61.0]),
//! });
//! let tx = index.begin_tx()?;
//! let candidates: Vec<_> = tx.filter(&predicate)?.collect::<Result<_, _>>()?;
//! assert_eq!(candidates.len(), 64);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod constants;
pub mod distance;
pub mod error;
pub mod index;
pub mod kmeans;
pub mod predicate;
pub mod store;
pub mod vector;

/// Identifier of one tuple in the indexed column.
pub type TupleId = u64;

// Re-export commonly used types at crate root
pub use catalog::IndexState;
pub use distance::{DistanceFunction, Metric};
pub use error::{Result, TesseraError};
pub use index::{IvfPqIndex, IvfPqIndexConfig, PqIndex, PqIndexConfig};
pub use predicate::{Cost, NotPartitionable, Predicate, ProximityScan};
pub use vector::{ElementKind, VectorColumn, VectorValue};

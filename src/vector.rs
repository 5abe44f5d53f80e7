//! Vector values as stored in an indexed column.
//!
//! The index pipeline computes in `f32`; wider element types are converted
//! at the boundary. The element kind is fixed once per index at build time.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{Result, TesseraError};
use crate::TupleId;

/// Element type of an indexed vector column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// 32-bit float components.
    F32,
    /// 64-bit float components.
    F64,
}

/// A vector value read from or written to an indexed column.
/// Data is stored in an `Arc` for cheap cloning across transactions.
#[derive(Clone, Debug, PartialEq)]
pub enum VectorValue {
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
}

impl VectorValue {
    /// Create an f32 vector value.
    pub fn from_f32(data: Vec<f32>) -> Self {
        Self::F32(data.into())
    }

    /// Create an f64 vector value.
    pub fn from_f64(data: Vec<f64>) -> Self {
        Self::F64(data.into())
    }

    /// Return the dimensionality of this vector.
    pub fn len(&self) -> usize {
        match self {
            Self::F32(d) => d.len(),
            Self::F64(d) => d.len(),
        }
    }

    /// True if the vector has no components.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element kind of this value.
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
        }
    }

    /// Component at index `i`, widened or narrowed to `f32`.
    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        match self {
            Self::F32(d) => d[i],
            Self::F64(d) => d[i] as f32,
        }
    }

    /// The contiguous subvector `[offset, offset + len)` as an `f32` buffer.
    pub fn subvector(&self, offset: usize, len: usize) -> Vec<f32> {
        match self {
            Self::F32(d) => d[offset..offset + len].to_vec(),
            Self::F64(d) => d[offset..offset + len].iter().map(|&x| x as f32).collect(),
        }
    }

    /// The full vector as `f32` components. Borrows when no conversion is
    /// needed.
    pub fn as_f32(&self) -> Cow<'_, [f32]> {
        match self {
            Self::F32(d) => Cow::Borrowed(d),
            Self::F64(d) => Cow::Owned(d.iter().map(|&x| x as f32).collect()),
        }
    }

    /// Verify this value matches the expected element kind and dimension.
    pub fn check(&self, kind: ElementKind, dimension: usize) -> Result<()> {
        if self.kind() != kind {
            return Err(TesseraError::ElementMismatch {
                expected: kind,
                actual: self.kind(),
            });
        }
        if self.len() != dimension {
            return Err(TesseraError::dimension_mismatch(dimension, self.len()));
        }
        Ok(())
    }
}

/// Read access to the vector column an index is built over. The rebuild
/// path scans it to draw training samples and to repopulate the signature
/// store. Absent (null) values are surfaced as `None`.
pub trait VectorColumn {
    /// Number of tuples in the column, nulls included.
    fn count(&self) -> u64;

    /// Iterate all tuples in tuple-id order.
    fn scan(&self) -> Box<dyn Iterator<Item = (TupleId, Option<VectorValue>)> + '_>;
}

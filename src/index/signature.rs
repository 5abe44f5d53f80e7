//! Signatures and their byte encodings for the signature store.
//!
//! A signature is the quantized form of one vector: one centroid id per
//! subspace. All key and value encodings are big-endian so that the store's
//! byte order matches numeric order.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Result, TesseraError};
use crate::TupleId;

/// The quantized form of one vector: per-subspace centroid ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    cells: SmallVec<[u16; 16]>,
}

impl Signature {
    /// Build a signature from per-subspace centroid ids.
    pub fn new(cells: impl Into<SmallVec<[u16; 16]>>) -> Self {
        Self {
            cells: cells.into(),
        }
    }

    /// Number of subspaces.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the signature holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The per-subspace centroid ids.
    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    /// Encode as big-endian u16 components.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.cells.len() * 2);
        for &cell in &self.cells {
            bytes.extend_from_slice(&cell.to_be_bytes());
        }
        bytes
    }

    /// Decode from big-endian u16 components.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(TesseraError::data_corruption(
                "signature encoding has odd length",
            ));
        }
        let cells = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { cells })
    }
}

/// Encode a tuple id as a store key or value.
pub fn encode_tuple_id(tuple_id: TupleId) -> [u8; 8] {
    tuple_id.to_be_bytes()
}

/// Decode a tuple id.
pub fn decode_tuple_id(bytes: &[u8]) -> Result<TupleId> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| TesseraError::data_corruption("tuple id encoding must be 8 bytes"))?;
    Ok(TupleId::from_be_bytes(array))
}

/// Encode a coarse-cell id as a store key.
pub fn encode_cell_id(cell: u16) -> [u8; 2] {
    cell.to_be_bytes()
}

/// Decode a coarse-cell id.
pub fn decode_cell_id(bytes: &[u8]) -> Result<u16> {
    let array: [u8; 2] = bytes
        .try_into()
        .map_err(|_| TesseraError::data_corruption("cell id encoding must be 2 bytes"))?;
    Ok(u16::from_be_bytes(array))
}

/// One entry of an IVFPQ inverted list: the tuple id followed by its
/// signature, stored as the duplicate value under the coarse-cell key.
#[derive(Debug, Clone, PartialEq)]
pub struct CellEntry {
    /// Tuple the signature belongs to.
    pub tuple_id: TupleId,
    /// Fine quantization of the tuple's vector.
    pub signature: Signature,
}

impl CellEntry {
    /// Encode as `[tuple_id u64 BE][signature u16 BE ...]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.signature.len() * 2);
        bytes.extend_from_slice(&encode_tuple_id(self.tuple_id));
        bytes.extend_from_slice(&self.signature.to_bytes());
        bytes
    }

    /// Decode an inverted-list entry.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(TesseraError::data_corruption(
                "cell entry encoding too short",
            ));
        }
        Ok(Self {
            tuple_id: decode_tuple_id(&bytes[..8])?,
            signature: Signature::from_bytes(&bytes[8..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let sig = Signature::new(vec![0u16, 7, 511, u16::MAX]);
        let decoded = Signature::from_bytes(&sig.to_bytes()).unwrap();
        assert_eq!(decoded, sig);
        assert_eq!(decoded.len(), 4);
    }

    #[test]
    fn test_signature_bytes_sort_like_cells() {
        // Big-endian keys must sort in numeric order.
        let low = Signature::new(vec![1u16, 200]).to_bytes();
        let high = Signature::new(vec![2u16, 0]).to_bytes();
        assert!(low < high);
    }

    #[test]
    fn test_signature_rejects_odd_length() {
        assert!(Signature::from_bytes(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_cell_entry_round_trip() {
        let entry = CellEntry {
            tuple_id: 123_456,
            signature: Signature::new(vec![3u16, 9, 12]),
        };
        let decoded = CellEntry::from_bytes(&entry.to_bytes()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_tuple_id_keys_sort_numerically() {
        assert!(encode_tuple_id(255) < encode_tuple_id(256));
        assert_eq!(decode_tuple_id(&encode_tuple_id(42)).unwrap(), 42);
        assert_eq!(decode_cell_id(&encode_cell_id(300)).unwrap(), 300);
    }
}

//! Catalog persistence for index descriptors.
//!
//! Each index persists one blob in the catalog store, keyed by index name:
//! its configuration, its lifecycle state, and the trained quantizer. The
//! blob is framed by a fixed header and protected by a CRC32 checksum.
//!
//! ```text
//! [MAGIC 8B][VERSION u32][CHECKSUM u32][bincode payload]
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::store::{ReadTransaction, WriteTransaction};

/// Magic bytes identifying a tessera catalog blob: "TESSERA\0"
pub const MAGIC: [u8; 8] = *b"TESSERA\0";

/// Current blob format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 16;

/// Name of the catalog store inside the environment.
pub const CATALOG_STORE: &str = "__tessera_catalog";

/// Lifecycle state of an index. A `Stale` index refuses queries until it
/// has been rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    /// Index reflects the column and serves queries.
    Clean,
    /// Index content is out of date; queries are refused.
    Stale,
}

/// The persisted descriptor of one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry<C, Q> {
    /// Name of the indexed column.
    pub column: String,
    /// Current lifecycle state.
    pub state: IndexState,
    /// Immutable index configuration; replaced wholesale on rebuild.
    pub config: C,
    /// Trained quantizer, absent until the first build completes.
    pub quantizer: Option<Q>,
}

impl<C, Q> CatalogEntry<C, Q>
where
    C: Serialize + DeserializeOwned,
    Q: Serialize + DeserializeOwned,
{
    /// Serialize this entry into a framed, checksummed blob.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut blob = Vec::with_capacity(HEADER_SIZE + payload.len());
        blob.extend_from_slice(&MAGIC);
        blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        blob.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        blob.extend_from_slice(&payload);
        Ok(blob)
    }

    /// Deserialize an entry from a framed blob, verifying magic, version
    /// and checksum.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_SIZE {
            return Err(TesseraError::data_corruption("catalog blob too small"));
        }
        if blob[0..8] != MAGIC {
            return Err(TesseraError::data_corruption("invalid magic bytes"));
        }
        let version = u32::from_le_bytes([blob[8], blob[9], blob[10], blob[11]]);
        if version > FORMAT_VERSION {
            return Err(TesseraError::data_corruption(format!(
                "unsupported blob version {} (max supported: {})",
                version, FORMAT_VERSION
            )));
        }
        let checksum = u32::from_le_bytes([blob[12], blob[13], blob[14], blob[15]]);
        let payload = &blob[HEADER_SIZE..];
        if crc32fast::hash(payload) != checksum {
            return Err(TesseraError::ChecksumMismatch);
        }
        Ok(bincode::deserialize(payload)?)
    }

    /// Read the entry for `index_name` from the catalog store. A missing
    /// entry is data corruption: the caller only asks for indexes it
    /// believes exist.
    pub fn read(tx: &ReadTransaction, index_name: &str) -> Result<Self> {
        let store = tx.open_store(CATALOG_STORE)?;
        let blob = store.get(index_name.as_bytes()).ok_or_else(|| {
            TesseraError::data_corruption(format!(
                "catalog entry for index '{index_name}' is missing"
            ))
        })?;
        Self::from_blob(blob)
    }

    /// Write the entry for `index_name`, replacing any previous blob.
    pub fn write(&self, tx: &mut WriteTransaction<'_>, index_name: &str) -> Result<()> {
        tx.create_store(CATALOG_STORE);
        tx.replace(CATALOG_STORE, index_name.as_bytes(), &self.to_blob()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Environment;

    type Entry = CatalogEntry<u32, Vec<f32>>;

    fn entry() -> Entry {
        CatalogEntry {
            column: "features".into(),
            state: IndexState::Clean,
            config: 7,
            quantizer: Some(vec![1.0, 2.0, 3.0]),
        }
    }

    #[test]
    fn test_blob_round_trip() {
        let blob = entry().to_blob().unwrap();
        let parsed = Entry::from_blob(&blob).unwrap();
        assert_eq!(parsed.column, "features");
        assert_eq!(parsed.state, IndexState::Clean);
        assert_eq!(parsed.config, 7);
        assert_eq!(parsed.quantizer, Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut blob = entry().to_blob().unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(
            Entry::from_blob(&blob),
            Err(TesseraError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_invalid_magic_detected() {
        let mut blob = entry().to_blob().unwrap();
        blob[0] = b'X';
        assert!(matches!(
            Entry::from_blob(&blob),
            Err(TesseraError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_store_round_trip() {
        let env = Environment::new();
        let mut tx = env.begin_write();
        entry().write(&mut tx, "idx").unwrap();
        tx.commit();

        let tx = env.begin_read();
        let parsed = Entry::read(&tx, "idx").unwrap();
        assert_eq!(parsed.config, 7);

        assert!(matches!(
            Entry::read(&tx, "other"),
            Err(TesseraError::DataCorruption(_))
        ));
    }
}

//! The IVFPQ index: coarse inverted lists over product-quantized
//! signatures.
//!
//! The coarse-cell id is the storage key; each duplicate value carries the
//! tuple id and its fine signature. Queries probe the `nprobe` nearest
//! cells instead of scanning the whole store.

use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{CatalogEntry, IndexState};
use crate::constants::cost;
use crate::distance::DistanceFunction;
use crate::error::{Result, TesseraError};
use crate::index::config::IvfPqIndexConfig;
use crate::index::cursor::{CandidateCursor, EntryLayout, ScanMode};
use crate::index::lookup::LookupTable;
use crate::index::probe::probe_cells;
use crate::index::quantizer::MultiStageQuantizer;
use crate::index::signature::{encode_cell_id, CellEntry};
use crate::index::{sample_column, signature_store_name};
use crate::predicate::{Cost, NotPartitionable, Predicate, ProximityScan};
use crate::store::{Environment, ReadTransaction, WriteTransaction};
use crate::vector::{VectorColumn, VectorValue};
use crate::TupleId;

/// Persisted descriptor of an IVFPQ index.
pub type IvfPqCatalogEntry = CatalogEntry<IvfPqIndexConfig, MultiStageQuantizer>;

/// An IVFPQ index over one vector column.
pub struct IvfPqIndex {
    name: String,
    env: Arc<Environment>,
}

impl IvfPqIndex {
    /// Create a new index. The index starts `Stale` with no trained
    /// quantizer; it serves queries only after the first [`rebuild`].
    ///
    /// [`rebuild`]: IvfPqIndex::rebuild
    pub fn create(
        env: Arc<Environment>,
        name: &str,
        column: &str,
        config: IvfPqIndexConfig,
    ) -> Result<Self> {
        let entry = IvfPqCatalogEntry {
            column: column.to_string(),
            state: IndexState::Stale,
            config,
            quantizer: None,
        };
        let mut tx = env.begin_write();
        tx.create_store(&signature_store_name(name));
        entry.write(&mut tx, name)?;
        tx.commit();
        Ok(Self {
            name: name.to_string(),
            env,
        })
    }

    /// Open an existing index. Fails with `DataCorruption` when the
    /// catalog entry is missing or unreadable.
    pub fn open(env: Arc<Environment>, name: &str) -> Result<Self> {
        let tx = env.begin_read();
        IvfPqCatalogEntry::read(&tx, name)?;
        Ok(Self {
            name: name.to_string(),
            env,
        })
    }

    /// Name of this index.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind this index to a transaction: the store snapshot is pinned and
    /// the catalog entry read from it, the distance function resolved and
    /// the quantizer deserialized once. The quantizer and the signatures
    /// it scores always come from the same snapshot, even when a rebuild
    /// commits while this context is alive.
    pub fn begin_tx(&self) -> Result<IvfPqIndexTx<'_>> {
        let tx = self.env.begin_read();
        let entry = IvfPqCatalogEntry::read(&tx, &self.name)?;
        let distance = entry
            .quantizer
            .as_ref()
            .map(|q| DistanceFunction::new(entry.config.metric, q.coarse().dimensionality()));
        Ok(IvfPqIndexTx {
            index: self,
            tx,
            entry,
            distance,
        })
    }

    /// Retrain both quantizer stages from a fresh sample of the column
    /// and repopulate the inverted lists. The index stays `Stale` until
    /// the final commit; any earlier failure leaves it `Stale` with the
    /// previous quantizer blob untouched.
    pub fn rebuild(&self, column: &dyn VectorColumn) -> Result<()> {
        let store_name = signature_store_name(&self.name);

        // Mark stale first so concurrent readers refuse to serve from the
        // old content while the rebuild runs.
        let mut entry = {
            let read = self.env.begin_read();
            let mut entry = IvfPqCatalogEntry::read(&read, &self.name)?;
            entry.state = IndexState::Stale;
            let mut tx = self.env.begin_write();
            entry.write(&mut tx, &self.name)?;
            tx.commit();
            entry
        };

        let config = entry.config;
        let sample = sample_column(
            column,
            config.num_centroids,
            config.num_centroids.max(config.num_coarse_centroids),
            config.seed,
        )?;
        let dim = sample[0].len();
        let num_subspaces = config.subspace_count_for(dim)?;
        let distance = DistanceFunction::new(config.metric, dim);

        info!(
            index = %self.name,
            sample = sample.len(),
            subspaces = num_subspaces,
            coarse = config.num_coarse_centroids,
            "training IVFPQ quantizer"
        );
        let quantizer = MultiStageQuantizer::train(
            &sample,
            distance,
            config.num_coarse_centroids,
            num_subspaces,
            config.num_centroids,
            config.seed,
        )?;

        let mut tx = self.env.begin_write();
        tx.create_store(&store_name);
        tx.truncate_store(&store_name)?;
        let mut entries = 0u64;
        for (tuple_id, value) in column.scan() {
            let Some(value) = value else { continue };
            value.check(config.element, dim)?;
            let (cell, signature) = quantizer.quantize(&value);
            let cell_entry = CellEntry {
                tuple_id,
                signature,
            };
            tx.put(&store_name, &encode_cell_id(cell), &cell_entry.to_bytes())?;
            entries += 1;
        }
        entry.quantizer = Some(quantizer);
        entry.state = IndexState::Clean;
        entry.write(&mut tx, &self.name)?;
        tx.commit();

        info!(index = %self.name, entries, "IVFPQ rebuild complete");
        Ok(())
    }
}

/// The per-transaction context of an IVFPQ index.
pub struct IvfPqIndexTx<'a> {
    index: &'a IvfPqIndex,
    tx: ReadTransaction,
    entry: IvfPqCatalogEntry,
    distance: Option<DistanceFunction>,
}

impl NotPartitionable for IvfPqIndexTx<'_> {}

impl<'a> IvfPqIndexTx<'a> {
    /// Current lifecycle state.
    pub fn state(&self) -> IndexState {
        self.entry.state
    }

    /// The configuration this index was created with.
    pub fn config(&self) -> &IvfPqIndexConfig {
        &self.entry.config
    }

    /// Number of entries in the signature store, as of this transaction's
    /// snapshot.
    pub fn count(&self) -> Result<u64> {
        Ok(self
            .tx
            .open_store(&signature_store_name(&self.index.name))?
            .count())
    }

    /// True when this index can serve the predicate: a proximity scan on
    /// the indexed column under the configured metric.
    pub fn can_process(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Proximity(scan) => {
                scan.column == self.entry.column && scan.metric == self.entry.config.metric
            }
            Predicate::Comparison { .. } => false,
        }
    }

    /// Estimated cost of serving the predicate. Probing touches roughly
    /// `nprobe / num_coarse_centroids` of the stored entries.
    pub fn cost_for(&self, predicate: &Predicate) -> Result<Cost> {
        if !self.can_process(predicate) {
            return Ok(Cost::INVALID);
        }
        let Some(quantizer) = self.entry.quantizer.as_ref() else {
            return Ok(Cost::INVALID);
        };
        let per_tuple = quantizer.fine().num_subspaces() as f64;
        let fraction = self.entry.config.effective_nprobe() as f64
            / self.entry.config.num_coarse_centroids as f64;
        let count = self.count()? as f64 * fraction.min(1.0);
        Ok(Cost {
            io: cost::IO_PER_COMPONENT * per_tuple,
            cpu: cost::CPU_PER_LOOKUP * per_tuple,
            accuracy: cost::ACCURACY_IVFPQ,
        }
        .scaled(count))
    }

    /// Open a candidate cursor probing the nearest coarse cells. The
    /// cursor shares this transaction's snapshot and outlives the context.
    pub fn filter(&self, predicate: &Predicate) -> Result<CandidateCursor> {
        let scan = self.checked_scan(predicate)?;
        let quantizer = self.quantizer()?;
        let distance = self
            .distance
            .ok_or_else(|| TesseraError::IndexStale(self.index.name.clone()))?;
        scan.query
            .check(self.entry.config.element, distance.dimensionality())?;

        let query = scan.query.as_f32();
        let cells = probe_cells(
            quantizer.coarse(),
            &query,
            self.entry.config.effective_nprobe(),
        );
        let table = LookupTable::new(&query, quantizer.fine());
        CandidateCursor::new(
            self.tx.clone(),
            &signature_store_name(&self.index.name),
            table,
            ScanMode::Cells(cells),
            EntryLayout::CellValue,
        )
    }

    /// Partitioned scans are not supported: inverted lists are probed by
    /// query distance, not by a splittable key range.
    pub fn filter_partition(
        &self,
        _predicate: &Predicate,
        _partition: usize,
        _partitions: usize,
    ) -> Result<CandidateCursor> {
        Err(TesseraError::not_supported(
            "IVFPQ index scans cannot be partitioned",
        ))
    }

    /// Apply an insert event. A null vector is a successful no-op.
    pub fn insert(
        &self,
        tx: &mut WriteTransaction<'_>,
        tuple_id: TupleId,
        value: Option<&VectorValue>,
    ) -> Result<()> {
        let Some(value) = value else { return Ok(()) };
        let Some(quantizer) = self.entry.quantizer.as_ref() else {
            // Not trained yet; the pending rebuild will pick this tuple up.
            debug!(index = %self.index.name, tuple_id, "insert before first build skipped");
            return Ok(());
        };
        value.check(self.entry.config.element, quantizer.coarse().dimensionality())?;
        let (cell, signature) = quantizer.quantize(value);
        let entry = CellEntry {
            tuple_id,
            signature,
        };
        tx.put(
            &signature_store_name(&self.index.name),
            &encode_cell_id(cell),
            &entry.to_bytes(),
        )
    }

    /// Apply an update event: remove the old entry, add the new one.
    pub fn update(
        &self,
        tx: &mut WriteTransaction<'_>,
        tuple_id: TupleId,
        old: Option<&VectorValue>,
        new: Option<&VectorValue>,
    ) -> Result<()> {
        self.delete(tx, tuple_id, old)?;
        self.insert(tx, tuple_id, new)
    }

    /// Apply a delete event via positioned delete of the exact
    /// `(cell, tuple_id + signature)` duplicate. A missing duplicate is a
    /// logged no-op.
    pub fn delete(
        &self,
        tx: &mut WriteTransaction<'_>,
        tuple_id: TupleId,
        old: Option<&VectorValue>,
    ) -> Result<()> {
        let Some(old) = old else { return Ok(()) };
        let Some(quantizer) = self.entry.quantizer.as_ref() else {
            debug!(index = %self.index.name, tuple_id, "delete before first build skipped");
            return Ok(());
        };
        old.check(self.entry.config.element, quantizer.coarse().dimensionality())?;
        let (cell, signature) = quantizer.quantize(old);
        let entry = CellEntry {
            tuple_id,
            signature,
        };
        let mut cursor = tx.open_cursor(&signature_store_name(&self.index.name))?;
        if cursor.search_both(&encode_cell_id(cell), &entry.to_bytes()) {
            cursor.delete_current();
        } else {
            debug!(index = %self.index.name, tuple_id, "delete found no cell entry");
        }
        Ok(())
    }

    fn quantizer(&self) -> Result<&MultiStageQuantizer> {
        self.entry.quantizer.as_ref().ok_or_else(|| {
            TesseraError::data_corruption(format!(
                "index '{}' has no trained quantizer",
                self.index.name
            ))
        })
    }

    fn checked_scan<'p>(&self, predicate: &'p Predicate) -> Result<&'p ProximityScan> {
        if self.entry.state == IndexState::Stale {
            return Err(TesseraError::IndexStale(self.index.name.clone()));
        }
        match predicate {
            Predicate::Proximity(scan) if self.can_process(predicate) => Ok(scan),
            _ => Err(TesseraError::unsupported_predicate(format!(
                "index '{}' cannot serve this predicate",
                self.index.name
            ))),
        }
    }
}

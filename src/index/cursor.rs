//! Candidate cursors over the signature store.
//!
//! A cursor owns its private read snapshot and a positioned store cursor;
//! both are released together when the cursor is dropped, which is also the
//! only cancellation mechanism. Results come back in probe/scan order, not
//! distance order; callers re-rank with exact distances.

use std::collections::VecDeque;

use crate::error::Result;
use crate::index::lookup::LookupTable;
use crate::index::signature::{decode_tuple_id, CellEntry, Signature};
use crate::store::{ReadTransaction, StoreCursor};
use crate::TupleId;

/// What part of the signature store a cursor visits.
pub enum ScanMode {
    /// Scan every entry (PQ).
    Full,
    /// Scan the selected coarse cells in probe order (IVFPQ).
    Cells(VecDeque<u16>),
}

/// How store entries decode into a tuple id and signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLayout {
    /// PQ layout: key = signature bytes, value = tuple id.
    SignatureKey,
    /// IVFPQ layout: key = coarse-cell id, value = tuple id + signature.
    CellValue,
}

enum CursorState {
    Init,
    Scanning,
    Exhausted,
}

/// A cursor yielding `(tuple_id, approximate_distance)` candidates.
pub struct CandidateCursor {
    // Field order keeps the store cursor dropping before its snapshot.
    cursor: StoreCursor,
    _tx: ReadTransaction,
    table: LookupTable,
    mode: ScanMode,
    layout: EntryLayout,
    state: CursorState,
    current: Option<(TupleId, f32)>,
}

impl std::fmt::Debug for CandidateCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateCursor")
            .field("layout", &self.layout)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl CandidateCursor {
    /// Open a cursor over `store_name` inside the given snapshot.
    pub fn new(
        tx: ReadTransaction,
        store_name: &str,
        table: LookupTable,
        mode: ScanMode,
        layout: EntryLayout,
    ) -> Result<Self> {
        let cursor = tx.open_store(store_name)?.open_cursor();
        Ok(Self {
            cursor,
            _tx: tx,
            table,
            mode,
            layout,
            state: CursorState::Init,
            current: None,
        })
    }

    /// Advance to the next candidate. Returns false once exhausted;
    /// further calls keep returning false.
    pub fn move_next(&mut self) -> Result<bool> {
        let positioned = match self.state {
            CursorState::Init => {
                self.state = CursorState::Scanning;
                match &mut self.mode {
                    ScanMode::Full => self.cursor.first(),
                    ScanMode::Cells(cells) => Self::seek_next_cell(&mut self.cursor, cells),
                }
            }
            CursorState::Scanning => match &mut self.mode {
                ScanMode::Full => self.cursor.next(),
                ScanMode::Cells(cells) => {
                    self.cursor.next_dup() || Self::seek_next_cell(&mut self.cursor, cells)
                }
            },
            CursorState::Exhausted => false,
        };

        if !positioned {
            self.state = CursorState::Exhausted;
            self.current = None;
            return Ok(false);
        }

        self.current = Some(self.decode_current()?);
        Ok(true)
    }

    /// The candidate at the current position, if any.
    pub fn value(&self) -> Option<(TupleId, f32)> {
        self.current
    }

    /// Seek to the first non-empty remaining cell. Cells absent from the
    /// store are simply skipped.
    fn seek_next_cell(cursor: &mut StoreCursor, cells: &mut VecDeque<u16>) -> bool {
        while let Some(cell) = cells.pop_front() {
            if cursor.search_key(&cell.to_be_bytes()) {
                return true;
            }
        }
        false
    }

    fn decode_current(&self) -> Result<(TupleId, f32)> {
        let key = self.cursor.key().unwrap_or_default();
        let value = self.cursor.value().unwrap_or_default();
        let (tuple_id, signature) = match self.layout {
            EntryLayout::SignatureKey => (decode_tuple_id(value)?, Signature::from_bytes(key)?),
            EntryLayout::CellValue => {
                let entry = CellEntry::from_bytes(value)?;
                (entry.tuple_id, entry.signature)
            }
        };
        Ok((tuple_id, self.table.approximate_distance(&signature)?))
    }
}

impl Iterator for CandidateCursor {
    type Item = Result<(TupleId, f32)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.move_next() {
            Ok(true) => self.value().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{DistanceFunction, Metric};
    use crate::index::quantizer::SingleStageQuantizer;
    use crate::index::signature::encode_tuple_id;
    use crate::store::Environment;
    use crate::vector::VectorValue;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample(n: usize, dim: usize, seed: u64) -> Vec<VectorValue> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                VectorValue::from_f32((0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
            })
            .collect()
    }

    fn table_for(sample: &[VectorValue]) -> (SingleStageQuantizer, LookupTable) {
        let distance = DistanceFunction::new(Metric::Euclidean, 4);
        let quantizer = SingleStageQuantizer::train(sample, distance, 2, 4, 42).unwrap();
        let query: Vec<f32> = sample[0].as_f32().into_owned();
        let table = LookupTable::new(&query, &quantizer);
        (quantizer, table)
    }

    #[test]
    fn test_full_scan_visits_every_entry() {
        let sample = sample(30, 4, 1);
        let (quantizer, table) = table_for(&sample);

        let env = Environment::new();
        let mut tx = env.begin_write();
        tx.create_store("sig");
        for (i, v) in sample.iter().enumerate() {
            let signature = quantizer.quantize(v);
            tx.put("sig", &signature.to_bytes(), &encode_tuple_id(i as TupleId))
                .unwrap();
        }
        tx.commit();

        let cursor = CandidateCursor::new(
            env.begin_read(),
            "sig",
            table,
            ScanMode::Full,
            EntryLayout::SignatureKey,
        )
        .unwrap();

        let mut seen: Vec<TupleId> = cursor.map(|r| r.unwrap().0).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..30).collect::<Vec<TupleId>>());
    }

    #[test]
    fn test_cell_scan_visits_selected_cells_only() {
        let sample = sample(20, 4, 2);
        let (quantizer, table) = table_for(&sample);

        let env = Environment::new();
        let mut tx = env.begin_write();
        tx.create_store("sig");
        // Place tuples in cells 0..4 round-robin; cell 9 stays absent.
        for (i, v) in sample.iter().enumerate() {
            let cell = (i % 4) as u16;
            let entry = CellEntry {
                tuple_id: i as TupleId,
                signature: quantizer.quantize(v),
            };
            tx.put("sig", &cell.to_be_bytes(), &entry.to_bytes()).unwrap();
        }
        tx.commit();

        let cells: VecDeque<u16> = vec![1, 9, 3].into();
        let cursor = CandidateCursor::new(
            env.begin_read(),
            "sig",
            table,
            ScanMode::Cells(cells),
            EntryLayout::CellValue,
        )
        .unwrap();

        let seen: Vec<TupleId> = cursor.map(|r| r.unwrap().0).collect();
        assert_eq!(seen.len(), 10);
        assert!(seen.iter().all(|id| id % 4 == 1 || id % 4 == 3));
        // Probe order: all of cell 1 before any of cell 3.
        let first_cell_3 = seen.iter().position(|id| id % 4 == 3).unwrap();
        assert!(seen[..first_cell_3].iter().all(|id| id % 4 == 1));
    }

    #[test]
    fn test_exhausted_cursor_stays_exhausted() {
        let sample = sample(5, 4, 3);
        let (quantizer, table) = table_for(&sample);

        let env = Environment::new();
        let mut tx = env.begin_write();
        tx.create_store("sig");
        let signature = quantizer.quantize(&sample[0]);
        tx.put("sig", &signature.to_bytes(), &encode_tuple_id(0))
            .unwrap();
        tx.commit();

        let mut cursor = CandidateCursor::new(
            env.begin_read(),
            "sig",
            table,
            ScanMode::Full,
            EntryLayout::SignatureKey,
        )
        .unwrap();

        assert!(cursor.move_next().unwrap());
        assert!(cursor.value().is_some());
        assert!(!cursor.move_next().unwrap());
        assert!(!cursor.move_next().unwrap());
        assert!(cursor.value().is_none());
    }

    #[test]
    fn test_cursor_reads_private_snapshot() {
        let sample = sample(10, 4, 4);
        let (quantizer, table) = table_for(&sample);

        let env = Environment::new();
        let mut tx = env.begin_write();
        tx.create_store("sig");
        for (i, v) in sample.iter().enumerate() {
            let signature = quantizer.quantize(v);
            tx.put("sig", &signature.to_bytes(), &encode_tuple_id(i as TupleId))
                .unwrap();
        }
        tx.commit();

        let cursor = CandidateCursor::new(
            env.begin_read(),
            "sig",
            table,
            ScanMode::Full,
            EntryLayout::SignatureKey,
        )
        .unwrap();

        // A commit after the cursor opened is invisible to it.
        let mut tx = env.begin_write();
        tx.truncate_store("sig").unwrap();
        tx.commit();

        assert_eq!(cursor.count(), 10);
    }
}

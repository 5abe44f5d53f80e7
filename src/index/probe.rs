//! Coarse-cell probing for IVFPQ queries.
//!
//! One pass over the coarse codebook with a bounded max-heap keeps the
//! `nprobe` nearest cells in O(C log nprobe); the selected cells come out
//! in ascending distance order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use crate::index::codebook::Codebook;

/// A candidate cell in the probe heap. Ordered by distance so the heap
/// root is the worst retained cell.
#[derive(Debug, Clone, Copy)]
struct ScoredCell {
    cell: u16,
    distance: f32,
}

impl PartialEq for ScoredCell {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for ScoredCell {}

impl PartialOrd for ScoredCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredCell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// Select the `nprobe` coarse cells nearest to `query`, ascending by
/// distance to the cell centroid.
pub fn probe_cells(coarse: &Codebook, query: &[f32], nprobe: usize) -> VecDeque<u16> {
    let nprobe = nprobe.min(coarse.len()).max(1);
    let mut heap: BinaryHeap<ScoredCell> = BinaryHeap::with_capacity(nprobe + 1);

    for cell in 0..coarse.len() {
        let distance = coarse.distance_from(query, cell);
        if heap.len() < nprobe {
            heap.push(ScoredCell {
                cell: cell as u16,
                distance,
            });
        } else if distance < heap.peek().map(|worst| worst.distance).unwrap_or(f32::INFINITY) {
            heap.pop();
            heap.push(ScoredCell {
                cell: cell as u16,
                distance,
            });
        }
    }

    // Popping yields descending distance; fill the deque back to front.
    let mut cells = VecDeque::with_capacity(heap.len());
    while let Some(scored) = heap.pop() {
        cells.push_front(scored.cell);
    }
    cells
}

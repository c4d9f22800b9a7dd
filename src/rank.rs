// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cosine similarity ranking with bounded top-K selection.
//!
//! Ranking is a pure read: it scores every entry of a store snapshot against
//! the query and keeps the K best in a fixed-size min-heap, O(n log k) time
//! and O(k) space. Large snapshots are scored in parallel with rayon; the
//! merge uses the same total order, so parallelism never changes the result.

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::store::{self, Snapshot, VectorStore};

/// Snapshot size at which scoring switches to parallel chunks.
const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// A single ranked result: an entry id and its cosine similarity to the
/// query, in [-1, 1]. Full precision is retained here; rendering rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    /// Identifier of the matching entry.
    pub id: String,
    /// Cosine similarity between query and entry.
    pub score: f32,
}

/// Returns the top-k entries of `store` most similar to `query`, best first.
///
/// The query is normalized before scoring, under the same invariants as
/// stored vectors. Ties in score are broken by ascending id, which makes the
/// output a total order independent of scan order or insertion timing. If
/// `k` exceeds the store size, all entries are returned ranked.
///
/// Fails with `InvalidArgument` if `k < 1`, `DimensionMismatch` if the query
/// length differs from the store dimension, and `DegenerateVector` if the
/// query norm is below [`store::MIN_NORM`].
pub fn top_k(query: &[f32], k: usize, store: &VectorStore) -> Result<Vec<RankedHit>> {
    if k == 0 {
        return Err(Error::InvalidArgument(
            "k must be at least 1".to_string(),
        ));
    }
    store::validate_dimensions(store.dimension(), query)?;

    let mut unit_query = query.to_vec();
    store::l2_normalize(&mut unit_query)?;

    let snapshot = store.scan();
    let selected = select_top_k(&unit_query, k, &snapshot);
    tracing::debug!(
        scanned = snapshot.len(),
        k,
        returned = selected.len(),
        "ranked scan complete"
    );
    Ok(selected)
}

fn select_top_k(unit_query: &[f32], k: usize, snapshot: &Snapshot) -> Vec<RankedHit> {
    // k beyond the snapshot returns everything ranked; clamping also bounds
    // the heap allocation
    let k = k.min(snapshot.len());
    if k == 0 {
        return Vec::new();
    }

    let top = if snapshot.len() >= PARALLEL_SCAN_THRESHOLD {
        snapshot
            .entries()
            .par_iter()
            .fold(
                || TopK::new(k),
                |mut acc, entry| {
                    acc.offer(dot(unit_query, &entry.vector), &entry.id);
                    acc
                },
            )
            .reduce(|| TopK::new(k), TopK::merge)
    } else {
        let mut acc = TopK::new(k);
        for entry in snapshot.iter() {
            acc.offer(dot(unit_query, &entry.vector), &entry.id);
        }
        acc
    };
    top.into_ranked()
}

/// Dot product of two unit vectors, clamped to the cosine range.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    let product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    product.clamp(-1.0, 1.0)
}

/// Heap element ordered by ranking position: higher score first, then
/// lexicographically smaller id. `total_cmp` keeps the order total.
#[derive(Debug, Clone)]
struct Candidate {
    score: f32,
    id: String,
}

impl Candidate {
    /// Whether this candidate ranks before `(score, id)`.
    fn outranks(&self, score: f32, id: &str) -> bool {
        match self.score.total_cmp(&score) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.id.as_str() < id,
        }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Fixed-capacity selection of the k best candidates.
///
/// The min-heap keeps the currently-worst retained candidate on top, so each
/// offer is a peek plus at most one pop/push.
struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    /// Offers a scored entry; the id is cloned only if it is retained.
    fn offer(&mut self, score: f32, id: &str) {
        if self.heap.len() == self.k {
            if let Some(Reverse(worst)) = self.heap.peek() {
                if worst.outranks(score, id) {
                    return;
                }
            }
            self.heap.pop();
        }
        self.heap.push(Reverse(Candidate {
            score,
            id: id.to_string(),
        }));
    }

    fn offer_candidate(&mut self, candidate: Candidate) {
        if self.heap.len() == self.k {
            if let Some(Reverse(worst)) = self.heap.peek() {
                if worst.outranks(candidate.score, &candidate.id) {
                    return;
                }
            }
            self.heap.pop();
        }
        self.heap.push(Reverse(candidate));
    }

    fn merge(mut self, other: TopK) -> TopK {
        for Reverse(candidate) in other.heap {
            self.offer_candidate(candidate);
        }
        self
    }

    /// Drains into ranked order, best first.
    fn into_ranked(self) -> Vec<RankedHit> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(candidate)| RankedHit {
                id: candidate.id,
                score: candidate.score,
            })
            .collect()
    }
}

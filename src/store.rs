// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store for normalized embedding vectors.
//!
//! Entries live in a contiguous arena with a parallel id index, so scans stay
//! cache-friendly and id lookups stay O(1). Every stored vector is normalized
//! to unit L2 norm exactly once, at insertion, which reduces cosine similarity
//! to a plain dot product at query time.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::{Error, Result};

/// Minimum L2 norm for a vector to be embeddable; anything below is rejected
/// as degenerate since cosine similarity is undefined for it.
pub const MIN_NORM: f32 = 1e-6;

/// A single stored embedding.
///
/// Vectors are immutable once stored; updating an item is modeled as
/// remove + insert (see [`crate::index::upsert`]).
#[derive(Debug, Clone)]
pub struct Entry {
    /// Unique identifier within the store.
    pub id: String,
    /// Unit-normalized embedding vector.
    pub vector: Vec<f32>,
    /// blake3 hex hash of the source text this vector was embedded from,
    /// when known. Used to skip re-embedding unchanged items.
    pub content_hash: Option<String>,
}

/// Arena of entries plus the id index into it.
///
/// Removal uses swap_remove and patches the index slot of the displaced
/// entry, keeping both removal and insertion O(1).
#[derive(Debug, Default)]
struct Arena {
    entries: Vec<Arc<Entry>>,
    index: HashMap<String, usize>,
}

/// An owned, consistent view of the store taken at a single point in time.
///
/// The snapshot shares entry data with the store via `Arc`, so taking one is
/// cheap and ranking over it never holds a store lock. Concurrent writes do
/// not affect an existing snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: Vec<Arc<Entry>>,
}

impl Snapshot {
    /// Iterates over the entries in this snapshot.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().map(|e| e.as_ref())
    }

    /// Entries as a slice, for chunked parallel scoring.
    pub fn entries(&self) -> &[Arc<Entry>] {
        &self.entries
    }

    /// Number of entries in this snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Thread-safe store of unit-normalized embedding vectors.
///
/// Reads (`scan`, `size`, `contains`) proceed concurrently; writes (`insert`,
/// `remove`, `swap_contents`) are mutually exclusive. A scan in progress
/// observes either the pre-write or post-write state, never a torn entry.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    arena: RwLock<Arena>,
}

impl VectorStore {
    /// Creates an empty store for vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidArgument(
                "vector dimension must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            arena: RwLock::new(Arena::default()),
        })
    }

    /// The fixed vector dimension of this store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of entries currently stored.
    pub fn size(&self) -> usize {
        self.arena.read().entries.len()
    }

    /// Whether an id is currently present.
    pub fn contains(&self, id: &str) -> bool {
        self.arena.read().index.contains_key(id)
    }

    /// Returns the stored content hash for an id, if the entry has one.
    pub fn content_hash(&self, id: &str) -> Option<String> {
        let arena = self.arena.read();
        let slot = *arena.index.get(id)?;
        arena.entries[slot].content_hash.clone()
    }

    /// Inserts a vector under a new id, normalizing it on the way in.
    ///
    /// Fails with `DuplicateId` if the id is taken, `DimensionMismatch` if
    /// the vector length differs from the store dimension, `DegenerateVector`
    /// if its norm is below [`MIN_NORM`], and `InvalidArgument` if it
    /// contains non-finite values. The store is unchanged on failure.
    pub fn insert(&self, id: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        self.insert_entry(id.into(), vector, None)
    }

    /// Like [`VectorStore::insert`], also recording the content hash of the
    /// source text the vector was embedded from.
    pub fn insert_hashed(
        &self,
        id: impl Into<String>,
        vector: Vec<f32>,
        content_hash: String,
    ) -> Result<()> {
        self.insert_entry(id.into(), vector, Some(content_hash))
    }

    fn insert_entry(&self, id: String, mut vector: Vec<f32>, hash: Option<String>) -> Result<()> {
        validate_dimensions(self.dimension, &vector)?;
        l2_normalize(&mut vector)?;

        let mut arena = self.arena.write();
        if arena.index.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        let slot = arena.entries.len();
        arena.entries.push(Arc::new(Entry {
            id: id.clone(),
            vector,
            content_hash: hash,
        }));
        arena.index.insert(id, slot);
        Ok(())
    }

    /// Removes the entry for an id. Fails with `NotFound` if absent.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut arena = self.arena.write();
        let slot = arena
            .index
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        arena.entries.swap_remove(slot);
        if slot < arena.entries.len() {
            let moved_id = arena.entries[slot].id.clone();
            arena.index.insert(moved_id, slot);
        }
        Ok(())
    }

    /// Takes a consistent snapshot of the current entries.
    ///
    /// Each call yields a fresh, independent traversal; snapshots are
    /// unaffected by writes that happen after they are taken.
    pub fn scan(&self) -> Snapshot {
        Snapshot {
            entries: self.arena.read().entries.clone(),
        }
    }

    /// Atomically replaces this store's full contents with `other`'s.
    ///
    /// Concurrent scans observe either the entirely-old or entirely-new
    /// content. Fails with `DimensionMismatch` if the dimensions differ;
    /// the live store is untouched in that case.
    pub fn swap_contents(&self, other: VectorStore) -> Result<()> {
        if other.dimension != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: other.dimension,
            });
        }
        let fresh = other.arena.into_inner();
        let count = fresh.entries.len();
        *self.arena.write() = fresh;
        tracing::debug!(entries = count, "store contents swapped");
        Ok(())
    }
}

/// Checks that a vector matches the expected dimension and is finite.
pub(crate) fn validate_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidArgument(
            "vector contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// L2 norm of a vector.
pub(crate) fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Normalizes a vector to unit L2 norm in place.
///
/// Fails with `DegenerateVector` if the norm is below [`MIN_NORM`].
pub(crate) fn l2_normalize(vector: &mut [f32]) -> Result<()> {
    let norm = l2_norm(vector);
    if norm < MIN_NORM {
        return Err(Error::DegenerateVector { min_norm: MIN_NORM });
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
    Ok(())
}

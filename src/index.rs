// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index lifecycle: bulk load, atomic rebuild, incremental upsert.
//!
//! `load` is all-or-nothing. It embeds the corpus in provider-sized batches
//! and fails fast on the first bad item, naming it, so a half-built index is
//! never handed out. `rebuild` swaps a freshly built store into the live one
//! in a single atomic step. `upsert` is the one defined path for updating an
//! entry's embedding (entries are otherwise immutable), and skips the
//! embedding call entirely when the text for an id is unchanged.

use crate::embedding::EmbeddingProvider;
use crate::errors::{Error, Result};
use crate::store::{self, VectorStore};

/// One corpus row: an external identifier and the text to embed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusItem {
    /// Identifier, unique within the corpus.
    pub id: String,
    /// Source text.
    pub text: String,
}

impl CorpusItem {
    /// Creates a corpus item.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// blake3 hex digest of a corpus text, as stored on entries for change
/// detection.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Builds a fresh store from a corpus, embedding every item.
///
/// The store dimension is taken from the first returned embedding. Fails
/// fast on the first duplicate id, dimension inconsistency, or degenerate
/// vector, wrapping the error with the offending item's id; the partial
/// store is discarded. An empty corpus is rejected with `InvalidArgument`
/// since no dimension can be inferred for it.
pub fn load(provider: &mut dyn EmbeddingProvider, corpus: &[CorpusItem]) -> Result<VectorStore> {
    if corpus.is_empty() {
        return Err(Error::InvalidArgument(
            "cannot load an empty corpus; create the store directly instead".to_string(),
        ));
    }

    let batch_size = provider.batch_size().max(1);
    let mut st: Option<VectorStore> = None;

    for batch in corpus.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|item| item.text.clone()).collect();
        let vectors = provider
            .embed_texts(&texts)
            .map_err(Error::embedding_failure)?;
        if vectors.len() != batch.len() {
            return Err(Error::embedding_failure(anyhow::anyhow!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        for (item, vector) in batch.iter().zip(vectors) {
            if st.is_none() {
                st = Some(VectorStore::new(vector.len())?);
            }
            if let Some(target) = st.as_ref() {
                target
                    .insert_hashed(item.id.clone(), vector, content_hash(&item.text))
                    .map_err(|e| e.for_corpus_item(&item.id))?;
            }
        }
    }

    // corpus is non-empty, so at least one batch ran
    let built = st.ok_or_else(|| {
        Error::embedding_failure(anyhow::anyhow!("provider produced no embeddings"))
    })?;
    tracing::debug!(
        entries = built.size(),
        dimension = built.dimension(),
        model = provider.model_id(),
        "corpus loaded"
    );
    Ok(built)
}

/// Rebuilds `live` from `corpus`: builds a fresh store, then atomically
/// swaps its full contents in. Queries concurrent with the rebuild observe
/// either the entirely-old or entirely-new content, never a mix. On any
/// failure the live store is left untouched.
pub fn rebuild(
    live: &VectorStore,
    provider: &mut dyn EmbeddingProvider,
    corpus: &[CorpusItem],
) -> Result<()> {
    let fresh = load(provider, corpus)?;
    live.swap_contents(fresh)
}

/// Inserts or replaces the entry for `id` with a fresh embedding of `text`.
///
/// If the stored content hash for `id` already matches `text`, the provider
/// is not called and the entry is left as is. The new vector is validated
/// before the old entry is removed, so a failed upsert never loses data.
pub fn upsert(
    st: &VectorStore,
    provider: &mut dyn EmbeddingProvider,
    id: &str,
    text: &str,
) -> Result<()> {
    let hash = content_hash(text);
    if st.content_hash(id).as_deref() == Some(hash.as_str()) {
        tracing::debug!(id, "upsert skipped, content unchanged");
        return Ok(());
    }

    let vector = provider.embed_one(text).map_err(Error::embedding_failure)?;
    store::validate_dimensions(st.dimension(), &vector)?;
    if store::l2_norm(&vector) < store::MIN_NORM {
        return Err(Error::DegenerateVector {
            min_norm: store::MIN_NORM,
        });
    }

    match st.remove(id) {
        Ok(()) | Err(Error::NotFound(_)) => {}
        Err(other) => return Err(other),
    }
    st.insert_hashed(id, vector, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Deterministic provider with per-text overrides and a call counter.
    struct TestProvider {
        dimension: usize,
        overrides: HashMap<String, Vec<f32>>,
        calls: usize,
    }

    impl TestProvider {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                overrides: HashMap::new(),
                calls: 0,
            }
        }

        fn with_override(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.overrides.insert(text.to_string(), vector);
            self
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            if let Some(vector) = self.overrides.get(text) {
                return vector.clone();
            }
            // spread texts across axes by byte sum
            let axis = text.bytes().map(usize::from).sum::<usize>() % self.dimension;
            let mut vector = vec![0.1; self.dimension];
            vector[axis] = 1.0;
            vector
        }
    }

    impl EmbeddingProvider for TestProvider {
        fn model_id(&self) -> &str {
            "test"
        }

        fn batch_size(&self) -> usize {
            2
        }

        fn embed_texts(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls += 1;
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }

    fn corpus() -> Vec<CorpusItem> {
        vec![
            CorpusItem::new("q1", "How do I fine-tune BERT?"),
            CorpusItem::new("q2", "What is gradient descent?"),
            CorpusItem::new("q3", "How to train a custom transformer model?"),
        ]
    }

    #[test]
    fn test_load_builds_store_with_hashes() {
        let mut provider = TestProvider::new(4);
        let st = load(&mut provider, &corpus()).unwrap();

        assert_eq!(st.size(), 3);
        assert_eq!(st.dimension(), 4);
        for item in corpus() {
            assert_eq!(
                st.content_hash(&item.id).as_deref(),
                Some(content_hash(&item.text).as_str())
            );
        }
    }

    #[test]
    fn test_load_batches_through_provider() {
        let mut provider = TestProvider::new(4);
        load(&mut provider, &corpus()).unwrap();
        // 3 items at batch size 2 -> 2 provider calls
        assert_eq!(provider.calls, 2);
    }

    #[test]
    fn test_load_empty_corpus_rejected() {
        let mut provider = TestProvider::new(4);
        let err = load(&mut provider, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_load_duplicate_id_names_offender() {
        let mut provider = TestProvider::new(4);
        let corpus = vec![
            CorpusItem::new("q1", "first"),
            CorpusItem::new("q1", "second"),
        ];
        let err = load(&mut provider, &corpus).unwrap_err();
        assert!(matches!(&err, Error::CorpusItem { id, .. } if id == "q1"));
        assert!(matches!(err.root_kind(), Error::DuplicateId(_)));
    }

    #[test]
    fn test_load_degenerate_item_names_offender() {
        let mut provider = TestProvider::new(4).with_override("bad text", vec![0.0; 4]);
        let corpus = vec![
            CorpusItem::new("ok", "fine text"),
            CorpusItem::new("bad", "bad text"),
        ];
        let err = load(&mut provider, &corpus).unwrap_err();
        assert!(matches!(&err, Error::CorpusItem { id, .. } if id == "bad"));
        assert!(matches!(err.root_kind(), Error::DegenerateVector { .. }));
    }

    #[test]
    fn test_rebuild_replaces_content_atomically() {
        let mut provider = TestProvider::new(4);
        let live = load(&mut provider, &corpus()).unwrap();

        let next = vec![CorpusItem::new("r1", "brand new corpus")];
        rebuild(&live, &mut provider, &next).unwrap();

        assert_eq!(live.size(), 1);
        assert!(live.contains("r1"));
        assert!(!live.contains("q1"));
    }

    #[test]
    fn test_rebuild_idempotent() {
        let mut provider = TestProvider::new(4);
        let live = load(&mut provider, &corpus()).unwrap();

        rebuild(&live, &mut provider, &corpus()).unwrap();
        let first = crate::rank::top_k(&[1.0, 0.0, 0.0, 0.0], 3, &live).unwrap();
        rebuild(&live, &mut provider, &corpus()).unwrap();
        let second = crate::rank::top_k(&[1.0, 0.0, 0.0, 0.0], 3, &live).unwrap();

        assert_eq!(live.size(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rebuild_failure_leaves_live_untouched() {
        let mut provider = TestProvider::new(4);
        let live = load(&mut provider, &corpus()).unwrap();

        let bad = vec![
            CorpusItem::new("dup", "text a"),
            CorpusItem::new("dup", "text b"),
        ];
        assert!(rebuild(&live, &mut provider, &bad).is_err());
        assert_eq!(live.size(), 3);
        assert!(live.contains("q1"));
    }

    #[test]
    fn test_upsert_inserts_new_entry() {
        let mut provider = TestProvider::new(4);
        let live = load(&mut provider, &corpus()).unwrap();

        upsert(&live, &mut provider, "q4", "What is attention?").unwrap();
        assert_eq!(live.size(), 4);
        assert!(live.contains("q4"));
    }

    #[test]
    fn test_upsert_replaces_changed_entry() {
        let mut provider = TestProvider::new(2)
            .with_override("old", vec![1.0, 0.0])
            .with_override("new", vec![0.0, 1.0]);
        let live = load(&mut provider, &[CorpusItem::new("a", "old")]).unwrap();

        upsert(&live, &mut provider, "a", "new").unwrap();
        assert_eq!(live.size(), 1);

        let hits = crate::rank::top_k(&[0.0, 1.0], 1, &live).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_upsert_skips_unchanged_text() {
        let mut provider = TestProvider::new(4);
        let live = load(&mut provider, &corpus()).unwrap();
        let calls_after_load = provider.calls;

        upsert(&live, &mut provider, "q1", "How do I fine-tune BERT?").unwrap();
        assert_eq!(provider.calls, calls_after_load);
        assert_eq!(live.size(), 3);
    }

    #[test]
    fn test_upsert_validates_before_removing() {
        let mut provider = TestProvider::new(2)
            .with_override("good", vec![1.0, 0.0])
            .with_override("zero", vec![0.0, 0.0]);
        let live = load(&mut provider, &[CorpusItem::new("a", "good")]).unwrap();

        let err = upsert(&live, &mut provider, "a", "zero").unwrap_err();
        assert!(matches!(err, Error::DegenerateVector { .. }));
        // old entry must survive the failed replacement
        assert!(live.contains("a"));
        assert_eq!(live.size(), 1);
    }

    #[test]
    fn test_upsert_rejects_wrong_dimension() {
        let mut provider = TestProvider::new(2).with_override("wide", vec![1.0, 0.0, 0.0]);
        let live = load(&mut provider, &[CorpusItem::new("a", "anchor")]).unwrap();

        let err = upsert(&live, &mut provider, "b", "wide").unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(live.size(), 1);
    }
}

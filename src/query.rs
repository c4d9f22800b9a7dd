// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query orchestration: text in, ranked ids out.
//!
//! [`QueryService`] owns the wiring between the embedding provider and the
//! ranking path. It embeds the query text exactly once per call, never
//! retries (whether a generator failure is transient is the caller's call),
//! and never caches embeddings; callers needing a cache wrap the service.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::embedding::EmbeddingProvider;
use crate::errors::{Error, Result};
use crate::rank::{self, RankedHit};
use crate::store::VectorStore;

/// Answers free-text queries against a shared [`VectorStore`].
///
/// The provider sits behind a mutex so the service can be shared across
/// query threads; the embedding call is the only blocking section, and the
/// store is never locked while it runs.
pub struct QueryService {
    provider: Mutex<Box<dyn EmbeddingProvider>>,
    store: Arc<VectorStore>,
}

impl QueryService {
    /// Creates a service over the given provider and store.
    pub fn new(provider: Box<dyn EmbeddingProvider>, store: Arc<VectorStore>) -> Self {
        Self {
            provider: Mutex::new(provider),
            store,
        }
    }

    /// The store this service queries.
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Embeds `text` and returns the top-k most similar entries.
    ///
    /// Provider failures (including a vector of unexpected dimension)
    /// surface as `EmbeddingFailure` wrapping the cause; ranking errors
    /// propagate unchanged.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<RankedHit>> {
        if k == 0 {
            return Err(Error::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let vector = {
            let mut provider = self.provider.lock();
            tracing::debug!(model = provider.model_id(), k, "embedding query text");
            provider.embed_one(text)
        }
        .map_err(Error::embedding_failure)?;

        if vector.len() != self.store.dimension() {
            return Err(Error::EmbeddingFailure(Box::new(
                Error::DimensionMismatch {
                    expected: self.store.dimension(),
                    actual: vector.len(),
                },
            )));
        }

        rank::top_k(&vector, k, &self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider stub mapping known texts to fixed vectors.
    struct FixtureProvider {
        dimension: usize,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl FixtureProvider {
        fn new(dimension: usize) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    dimension,
                    calls: calls.clone(),
                    fail: false,
                },
                calls,
            )
        }

        fn failing() -> Self {
            Self {
                dimension: 2,
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0.0; self.dimension];
            match text {
                "east" => vector[0] = 1.0,
                "north" => vector[1] = 1.0,
                _ => {
                    vector[0] = 1.0;
                    vector[1] = 1.0;
                }
            }
            vector
        }
    }

    impl EmbeddingProvider for FixtureProvider {
        fn model_id(&self) -> &str {
            "fixture"
        }

        fn batch_size(&self) -> usize {
            8
        }

        fn embed_texts(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("model backend unavailable");
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }

    fn seeded_store() -> Arc<VectorStore> {
        let store = VectorStore::new(2).unwrap();
        store.insert("east", vec![1.0, 0.0]).unwrap();
        store.insert("north", vec![0.0, 1.0]).unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_query_returns_ranked_hits() {
        let (provider, _) = FixtureProvider::new(2);
        let service = QueryService::new(Box::new(provider), seeded_store());

        let hits = service.query("east", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "east");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].id, "north");
    }

    #[test]
    fn test_embeds_exactly_once_per_query() {
        let (provider, calls) = FixtureProvider::new(2);
        let service = QueryService::new(Box::new(provider), seeded_store());

        service.query("east", 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        service.query("north", 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_provider_failure_wrapped() {
        let service = QueryService::new(Box::new(FixtureProvider::failing()), seeded_store());
        let err = service.query("east", 1).unwrap_err();
        assert!(matches!(err, Error::EmbeddingFailure(_)));
        assert!(err.to_string().contains("embedding generation failed"));
    }

    #[test]
    fn test_unexpected_dimension_wrapped_as_embedding_failure() {
        let (provider, _) = FixtureProvider::new(5);
        let service = QueryService::new(Box::new(provider), seeded_store());
        let err = service.query("east", 1).unwrap_err();
        assert!(matches!(err, Error::EmbeddingFailure(_)));
    }

    #[test]
    fn test_k_zero_rejected_without_embedding() {
        let (provider, calls) = FixtureProvider::new(2);
        let service = QueryService::new(Box::new(provider), seeded_store());
        let err = service.query("east", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_k_beyond_store_size_returns_all() {
        let (provider, _) = FixtureProvider::new(2);
        let service = QueryService::new(Box::new(provider), seeded_store());
        let hits = service.query("east", 50).unwrap();
        assert_eq!(hits.len(), 2);
    }
}

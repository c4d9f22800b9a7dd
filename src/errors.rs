// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the retrieval engine.
//!
//! Every fallible operation in the library returns [`Error`] so callers can
//! match on the failure kind. Errors are always propagated to the immediate
//! caller; the engine never recovers silently or substitutes defaults.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the retrieval engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A vector's length does not match the store's fixed dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The store's fixed dimension.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// A vector's L2 norm is below the degeneracy threshold; cosine
    /// similarity is undefined for it.
    #[error("degenerate vector: L2 norm below {min_norm}")]
    DegenerateVector {
        /// The minimum accepted norm.
        min_norm: f32,
    },

    /// An identifier is already present in the store.
    #[error("duplicate id: {0:?}")]
    DuplicateId(String),

    /// An identifier is not present in the store.
    #[error("id not found: {0:?}")]
    NotFound(String),

    /// A caller-supplied argument is out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The external embedding generator failed, timed out, was cancelled, or
    /// returned a vector of unexpected shape.
    #[error("embedding generation failed: {0}")]
    EmbeddingFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A bulk-load failure, annotated with the corpus item that caused it.
    #[error("corpus item {id:?}: {source}")]
    CorpusItem {
        /// Identifier of the offending corpus item.
        id: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps a provider failure as [`Error::EmbeddingFailure`].
    pub fn embedding_failure(source: anyhow::Error) -> Self {
        Error::EmbeddingFailure(source.into())
    }

    /// Annotates an error with the corpus item it occurred on.
    pub fn for_corpus_item(self, id: impl Into<String>) -> Self {
        Error::CorpusItem {
            id: id.into(),
            source: Box::new(self),
        }
    }

    /// Returns the underlying error for a [`Error::CorpusItem`], or `self`.
    pub fn root_kind(&self) -> &Error {
        match self {
            Error::CorpusItem { source, .. } => source.root_kind(),
            other => other,
        }
    }
}

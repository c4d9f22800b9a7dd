// SPDX-License-Identifier: MIT OR Apache-2.0

//! simdex - semantic similarity retrieval engine
//!
//! An in-memory store of unit-normalized embeddings with exact cosine top-K
//! ranking, deterministic tie-breaking, and an atomic-rebuild lifecycle.
//! Embeddings come from pluggable providers behind [`embedding::EmbeddingProvider`].

pub mod config;
pub mod embedding;
pub mod errors;
pub mod index;
pub mod output;
pub mod query;
pub mod rank;
pub mod store;

pub use errors::{Error, Result};
pub use rank::RankedHit;
pub use store::VectorStore;

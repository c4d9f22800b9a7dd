// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for simdex
//!
//! Loads configuration from .simdexrc.toml in the current directory or
//! ~/.config/simdex/config.toml. CLI flags win over config values.

use serde::Deserialize;
use std::path::PathBuf;

use crate::embedding::DEFAULT_DIMENSION;

/// Output format for results (mirrored from cli for library use)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOutputFormat {
    #[default]
    Text,
    Json,
}

/// Embedding provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// In-process fastembed model
    #[default]
    Builtin,
    /// External embedder process fed JSON on stdin
    Command,
    /// Deterministic blake3-derived vectors (offline/tests)
    Hashed,
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Default number of results to return
    pub top_k: Option<usize>,
}

impl SearchSettings {
    /// Get default top-k (defaults to 3)
    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(3)
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider kind (builtin, command, hashed)
    pub provider: Option<ProviderKind>,
    /// Model identifier passed to the provider
    pub model: Option<String>,
    /// Command to execute for the command provider
    pub command: Option<String>,
    /// Vector dimension for the hashed provider
    pub dimension: Option<usize>,
}

impl EmbeddingSettings {
    /// Get provider kind (defaults to Builtin)
    pub fn provider(&self) -> ProviderKind {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "all-MiniLM-L6-v2")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("all-MiniLM-L6-v2")
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get hashed-provider dimension (defaults to the builtin model's)
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(DEFAULT_DIMENSION)
    }
}

/// Configuration loaded from .simdexrc.toml or ~/.config/simdex/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format (text or json)
    pub default_format: Option<ConfigOutputFormat>,

    /// Search configuration
    #[serde(default)]
    pub search: SearchSettings,

    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingSettings,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .simdexrc.toml in current directory
    /// 2. ~/.config/simdex/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(&PathBuf::from(".simdexrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("simdex").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    fn load_from_path(path: &PathBuf) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
                None
            }
        }
    }

    /// Merge CLI top-k with config (CLI wins)
    pub fn merge_top_k(&self, cli_value: Option<usize>) -> usize {
        cli_value.unwrap_or_else(|| self.search.top_k())
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchSettings {
        &self.search
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingSettings {
        &self.embeddings
    }
}

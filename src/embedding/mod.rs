// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - the boundary to external embedding generators.
//!
//! The retrieval core never talks to a model directly; it consumes vectors
//! through the [`EmbeddingProvider`] trait, selected at runtime from
//! configuration.

pub mod provider;

use anyhow::Context;

use crate::config::{EmbeddingSettings, ProviderKind};

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use provider::{FastEmbedConfig, FastEmbedder};
pub use provider::{CommandProvider, EmbeddingProvider, HashedProvider, DEFAULT_DIMENSION};

/// Builds the embedding provider selected by the given settings.
pub fn resolve_provider(
    settings: &EmbeddingSettings,
) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    match settings.provider() {
        ProviderKind::Builtin => {
            #[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
            {
                let provider =
                    FastEmbedder::from_env().context("Failed to start builtin embedding model")?;
                Ok(Box::new(provider))
            }
            #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
            {
                anyhow::bail!(
                    "builtin embedding provider is not available on this target; \
                     configure a command or hashed provider"
                )
            }
        }
        ProviderKind::Command => {
            let command = settings.command();
            let executable = command.split_whitespace().next().unwrap_or_default();
            if executable.is_empty() {
                anyhow::bail!("embedding command is empty");
            }
            which::which(executable)
                .with_context(|| format!("embedding command '{executable}' not found in PATH"))?;
            Ok(Box::new(CommandProvider::new(
                command.to_string(),
                settings.model().to_string(),
            )))
        }
        ProviderKind::Hashed => Ok(Box::new(HashedProvider::new(settings.dimension()))),
    }
}

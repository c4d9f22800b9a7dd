// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// simdex - semantic similarity retrieval
///
/// Embeds a corpus of (id, text) rows, then ranks them by cosine similarity
/// to a free-text query. Deterministic ordering, pluggable embedding
/// providers.
#[derive(Parser, Debug)]
#[command(name = "simdex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Embedding provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliProvider {
    /// In-process fastembed model
    Builtin,
    /// External embedder command from config
    Command,
    /// Deterministic hashed vectors (offline/tests)
    Hashed,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank corpus items by similarity to a query
    #[command(alias = "q")]
    Query {
        /// Query text
        query: String,

        /// Path to a corpus file: one `id<TAB>text` row per line
        #[arg(short, long)]
        corpus: PathBuf,

        /// Number of results to return
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,

        /// Embedding provider (overrides config)
        #[arg(long, value_enum)]
        provider: Option<CliProvider>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

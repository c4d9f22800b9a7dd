// SPDX-License-Identifier: MIT OR Apache-2.0

//! simdex - semantic similarity retrieval CLI
//!
//! Thin wrapper over the library: loads a tabular corpus, embeds it with the
//! configured provider, and prints the top-k matches for a query.

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use indicatif::ProgressBar;
use tracing_subscriber::EnvFilter;

use cli::{Cli, CliProvider, Commands, OutputFormat};
use simdex::config::{Config, ConfigOutputFormat, EmbeddingSettings, ProviderKind};
use simdex::index::{self, CorpusItem};
use simdex::query::QueryService;
use simdex::{embedding, output};

fn main() -> Result<()> {
    // Initialize tracing with SIMDEX_LOG env var (e.g., SIMDEX_LOG=debug simdex query ...)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SIMDEX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load();
    let format = effective_format(cli.format, &config);

    match cli.command {
        Commands::Query {
            query,
            corpus,
            top_k,
            provider,
        } => {
            let k = config.merge_top_k(top_k);
            if k == 0 {
                bail!("--top-k must be at least 1");
            }

            let corpus = read_corpus(&corpus)?;
            let settings = embedding_settings(provider, &config);
            let mut embedder = embedding::resolve_provider(&settings)?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_message(format!("embedding {} corpus items", corpus.len()));
            spinner.enable_steady_tick(Duration::from_millis(100));
            let store = index::load(embedder.as_mut(), &corpus)
                .context("failed to build index from corpus")?;
            spinner.finish_and_clear();

            let service = QueryService::new(embedder, Arc::new(store));
            let hits = service.query(&query, k).context("query failed")?;

            match format {
                OutputFormat::Text => {
                    print!("{}", output::format_text(&hits, output::use_colors()));
                }
                OutputFormat::Json => {
                    println!("{}", output::format_json(&hits)?);
                }
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "simdex", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn effective_format(cli_format: Option<OutputFormat>, config: &Config) -> OutputFormat {
    cli_format.unwrap_or(match config.default_format {
        Some(ConfigOutputFormat::Json) => OutputFormat::Json,
        _ => OutputFormat::Text,
    })
}

fn embedding_settings(cli_provider: Option<CliProvider>, config: &Config) -> EmbeddingSettings {
    let mut settings = config.embeddings().clone();
    if let Some(provider) = cli_provider {
        settings.provider = Some(match provider {
            CliProvider::Builtin => ProviderKind::Builtin,
            CliProvider::Command => ProviderKind::Command,
            CliProvider::Hashed => ProviderKind::Hashed,
        });
    }
    settings
}

/// Reads a corpus file of `id<TAB>text` rows. Blank lines are skipped.
fn read_corpus(path: &Path) -> Result<Vec<CorpusItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read corpus file: {}", path.display()))?;

    let mut items = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((id, text)) = line.split_once('\t') else {
            bail!(
                "{}:{}: expected `id<TAB>text`, got {:?}",
                path.display(),
                lineno + 1,
                line
            );
        };
        items.push(CorpusItem::new(id.trim(), text.trim()));
    }

    if items.is_empty() {
        bail!("corpus file {} contains no rows", path.display());
    }
    Ok(items)
}

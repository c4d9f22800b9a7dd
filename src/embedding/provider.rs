// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! The retrieval core consumes embeddings only through [`EmbeddingProvider`];
//! any capability-compatible generator satisfies the contract. Ships with a
//! fastembed-backed builtin provider, a command provider that shells out to
//! an external embedder process, and a deterministic hashed provider for
//! offline use and tests.

use anyhow::{bail, Context, Result};
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde_json::Value;
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

/// Embedding dimension of the default model (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSION: usize = 384;

const DEFAULT_BUILTIN_MODEL: &str = "minilm";
const DEFAULT_BATCH_SIZE: usize = 512;
const MAX_BATCH_SIZE: usize = 1024;
const DEFAULT_MAX_CHARS: usize = 2000;
const DEFAULT_COMMAND_BATCH_SIZE: usize = 64;

/// Trait for embedding generators.
///
/// Implementations should be deterministic enough that repeated calls with
/// identical text return effectively identical vectors; ranking correctness
/// depends on it.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Returns the batch size bulk callers should use.
    fn batch_size(&self) -> usize;

    /// Generates embeddings for the given texts, one vector per text.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("provider returned no embedding"))
    }
}

impl EmbeddingProvider for Box<dyn EmbeddingProvider> {
    fn model_id(&self) -> &str {
        self.as_ref().model_id()
    }

    fn batch_size(&self) -> usize {
        self.as_ref().batch_size()
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.as_mut().embed_texts(texts)
    }
}

/// Configuration for the builtin fastembed provider.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
#[derive(Debug, Clone)]
pub struct FastEmbedConfig {
    pub model: EmbeddingModel,
    pub batch_size: usize,
    pub max_chars: usize,
    pub normalize: bool,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedConfig {
    /// Reads SIMDEX_EMBED_* environment overrides.
    pub fn from_env() -> Result<Self> {
        let model = parse_model_env()?;
        let mut batch_size = parse_usize_env("SIMDEX_EMBED_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            batch_size = DEFAULT_BATCH_SIZE;
        }
        if batch_size > MAX_BATCH_SIZE {
            tracing::warn!(
                requested = batch_size,
                max = MAX_BATCH_SIZE,
                "SIMDEX_EMBED_BATCH_SIZE exceeds max; clamping"
            );
            batch_size = MAX_BATCH_SIZE;
        }

        let mut max_chars = parse_usize_env("SIMDEX_EMBED_MAX_CHARS", DEFAULT_MAX_CHARS)?;
        if max_chars == 0 {
            max_chars = DEFAULT_MAX_CHARS;
        }

        let normalize = parse_bool_env("SIMDEX_EMBED_NORMALIZE", true)?;

        Ok(Self {
            model,
            batch_size,
            max_chars,
            normalize,
        })
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl Default for FastEmbedConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModel::AllMiniLML6V2,
            batch_size: DEFAULT_BATCH_SIZE,
            max_chars: DEFAULT_MAX_CHARS,
            normalize: true,
        }
    }
}

/// Builtin provider backed by fastembed (all-MiniLM-L6-v2 by default).
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedder {
    embedder: TextEmbedding,
    config: FastEmbedConfig,
    model_id: String,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedder {
    pub fn new(config: FastEmbedConfig) -> Result<Self> {
        let model = config.model.clone();
        let model_id = model.to_string();
        let init = InitOptions::new(model);
        let embedder =
            TextEmbedding::try_new(init).context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder,
            config,
            model_id,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(FastEmbedConfig::from_env()?)
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.config.max_chars);
        let mut embeddings = self
            .embedder
            .embed(&prepared, Some(self.config.batch_size))?;

        if self.config.normalize {
            for embedding in embeddings.iter_mut() {
                l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }
}

/// Command provider that shells out to an external embedder process.
///
/// Writes `{"model": ..., "texts": [...]}` JSON to the child's stdin and
/// expects a JSON array of float rows (or an object with an `embeddings`,
/// `vectors`, or `data` field) on stdout.
pub struct CommandProvider {
    command: String,
    model: String,
    batch_size: usize,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self {
            command,
            model,
            batch_size: DEFAULT_COMMAND_BATCH_SIZE,
        }
    }

    fn run_command(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload_str = payload.to_string();
            stdin
                .write_all(payload_str.as_bytes())
                .context("Failed to write embedding payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embedding command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: Value = serde_json::from_str(stdout.trim())
            .with_context(|| "Failed to parse embedding command output as JSON")?;

        let embeddings_value = match parsed {
            Value::Array(arr) => Value::Array(arr),
            Value::Object(ref obj) => {
                if let Some(value) = obj.get("embeddings") {
                    value.clone()
                } else if let Some(value) = obj.get("vectors") {
                    value.clone()
                } else if let Some(value) = obj.get("data") {
                    value.clone()
                } else {
                    bail!("Embedding command output missing 'embeddings' field");
                }
            }
            _ => bail!("Embedding command output must be JSON array or object"),
        };

        let vectors = embeddings_value
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Embedding output must be a JSON array"))?
            .iter()
            .map(|row| {
                row.as_array()
                    .ok_or_else(|| anyhow::anyhow!("Embedding row must be an array"))?
                    .iter()
                    .map(|value| {
                        value
                            .as_f64()
                            .ok_or_else(|| anyhow::anyhow!("Embedding value must be a number"))
                            .map(|v| v as f32)
                    })
                    .collect::<Result<Vec<f32>>>()
            })
            .collect::<Result<Vec<Vec<f32>>>>()?;

        if vectors.len() != texts.len() {
            bail!(
                "Embedding command returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }

        Ok(vectors)
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run_command(texts)
    }
}

/// Deterministic provider deriving unit vectors from a blake3 XOF of the
/// text. No model, no network; identical text always yields the identical
/// vector, distinct texts almost surely differ. For tests, CI, and offline
/// smoke runs; the vectors carry no semantic signal.
pub struct HashedProvider {
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HashedProvider {
    /// Creates a hashed provider emitting vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            model: format!("hashed-{dimension}"),
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        let mut reader = hasher.finalize_xof();

        let mut bytes = vec![0u8; self.dimension * 4];
        reader.fill(&mut bytes);

        let mut vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| {
                let bits = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                // 24 high bits mapped into [-0.5, 0.5)
                (bits >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashedProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.hash_vector(text)).collect())
    }
}

fn truncate_texts<'a>(texts: &'a [String], max_chars: usize) -> Vec<Cow<'a, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    let mut count = 0;
    for (idx, _) in input.char_indices() {
        if count == max_chars {
            return Cow::Owned(input[..idx].to_string());
        }
        count += 1;
    }

    Cow::Borrowed(input)
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn parse_model_env() -> Result<EmbeddingModel> {
    let raw = env::var("SIMDEX_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_BUILTIN_MODEL.to_string());
    let value = raw.trim();
    if value.is_empty() {
        return Ok(EmbeddingModel::AllMiniLML6V2);
    }

    match value.to_lowercase().as_str() {
        "minilm"
        | "all-minilm-l6-v2"
        | "allminilm-l6-v2"
        | "sentence-transformers/all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        other => bail!(
            "Unsupported SIMDEX_EMBED_MODEL '{}'. Supported value: {}",
            other,
            DEFAULT_BUILTIN_MODEL
        ),
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn parse_usize_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(default)
            } else {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {} value: {}", name, value))
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn parse_bool_env(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_lowercase();
            if value.is_empty() {
                return Ok(default);
            }
            match value.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => bail!("Invalid {} value: {}", name, other),
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_provider_deterministic() {
        let mut provider = HashedProvider::new(64);
        let first = provider.embed_one("how do I fine-tune BERT?").unwrap();
        let second = provider.embed_one("how do I fine-tune BERT?").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_hashed_provider_distinct_texts_differ() {
        let mut provider = HashedProvider::new(32);
        let a = provider.embed_one("gradient descent").unwrap();
        let b = provider.embed_one("transformers").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hashed_provider_unit_norm() {
        let mut provider = HashedProvider::new(384);
        let vector = provider.embed_one("anything at all").unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_batch() {
        let mut provider = HashedProvider::new(16);
        let result = provider.embed_texts(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_embed_one_pops_single_vector() {
        let mut provider = HashedProvider::new(8);
        let vector = provider.embed_one("test").unwrap();
        assert_eq!(vector.len(), 8);
    }

    #[test]
    fn test_truncate_to_chars() {
        let input = "hello";
        assert_eq!(
            truncate_to_chars(input, 2),
            Cow::<str>::Owned("he".to_string())
        );
        assert_eq!(truncate_to_chars(input, 5), Cow::Borrowed(input));
    }
}

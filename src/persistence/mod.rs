//! Persistence layer for caching pre-computed tool embeddings.
//!
//! Embedding a few hundred tool descriptions at every start is the slowest
//! part of bringing the index up. The cache is keyed by a hash of the model
//! id and every tool's embedding text, so any catalog or model change is a
//! miss.

use crate::error::{AppError, Result};
use crate::ingestion::ToolDescriptor;
use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Cache file format version. Increment when format changes.
const CACHE_VERSION: u32 = 1;

/// Magic bytes to identify valid cache files.
const CACHE_MAGIC: &[u8; 8] = b"TOOLSCOP";

fn io_error(context: &str) -> impl FnOnce(std::io::Error) -> AppError + '_ {
    move |e| AppError::CacheError(format!("{}: {}", context, e))
}

/// Cached embeddings with metadata for validation.
pub struct EmbeddingsCache {
    pub version: u32,
    /// SHA256 of model id + tool embedding texts
    pub catalog_hash: [u8; 32],
    pub num_tools: usize,
    pub embedding_dim: usize,
    /// num_tools × embedding_dim, row-major
    pub embeddings: Array2<f32>,
}

impl EmbeddingsCache {
    /// Hash the inputs that determine the embedding matrix.
    pub fn compute_catalog_hash(model_id: &str, tools: &[ToolDescriptor]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update(b"\n");

        for tool in tools {
            hasher.update(tool.name.as_bytes());
            hasher.update(b"|");
            hasher.update(tool.inference_view.as_bytes());
            hasher.update(b"\n");
        }

        hasher.finalize().into()
    }

    pub fn new(model_id: &str, tools: &[ToolDescriptor], embeddings: Array2<f32>) -> Self {
        Self {
            version: CACHE_VERSION,
            catalog_hash: Self::compute_catalog_hash(model_id, tools),
            num_tools: tools.len(),
            embedding_dim: embeddings.ncols(),
            embeddings,
        }
    }

    /// Save cache to binary file.
    ///
    /// File format:
    /// - 8 bytes: magic "TOOLSCOP"
    /// - 4 bytes: version (u32 LE)
    /// - 32 bytes: catalog_hash
    /// - 8 bytes: num_tools (u64 LE)
    /// - 8 bytes: embedding_dim (u64 LE)
    /// - N bytes: embeddings data (f32 LE, row-major)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error("Failed to create cache directory"))?;
        }

        let file = File::create(path).map_err(io_error("Failed to create cache file"))?;
        let mut writer = BufWriter::new(file);

        writer
            .write_all(CACHE_MAGIC)
            .map_err(io_error("Failed to write cache magic"))?;
        writer
            .write_all(&self.version.to_le_bytes())
            .map_err(io_error("Failed to write cache version"))?;
        writer
            .write_all(&self.catalog_hash)
            .map_err(io_error("Failed to write catalog hash"))?;
        writer
            .write_all(&(self.num_tools as u64).to_le_bytes())
            .map_err(io_error("Failed to write num_tools"))?;
        writer
            .write_all(&(self.embedding_dim as u64).to_le_bytes())
            .map_err(io_error("Failed to write embedding_dim"))?;

        for &val in self.embeddings.iter() {
            writer
                .write_all(&val.to_le_bytes())
                .map_err(io_error("Failed to write embedding data"))?;
        }

        writer.flush().map_err(io_error("Failed to flush cache file"))?;

        tracing::info!(
            path = %path.display(),
            num_tools = self.num_tools,
            embedding_dim = self.embedding_dim,
            size_bytes = 8 + 4 + 32 + 8 + 8 + (self.num_tools * self.embedding_dim * 4),
            "Embeddings cache saved"
        );

        Ok(())
    }

    /// Load cache from binary file.
    ///
    /// Returns None if the file doesn't exist or has a foreign magic/version.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Cache file does not exist");
            return Ok(None);
        }

        let file = File::open(path).map_err(io_error("Failed to open cache file"))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        if reader.read_exact(&mut magic).is_err() || &magic != CACHE_MAGIC {
            tracing::warn!(path = %path.display(), "Invalid cache magic, ignoring");
            return Ok(None);
        }

        let mut version_bytes = [0u8; 4];
        reader
            .read_exact(&mut version_bytes)
            .map_err(io_error("Failed to read cache version"))?;
        let version = u32::from_le_bytes(version_bytes);

        if version != CACHE_VERSION {
            tracing::warn!(
                path = %path.display(),
                cache_version = version,
                expected_version = CACHE_VERSION,
                "Cache version mismatch, ignoring"
            );
            return Ok(None);
        }

        let mut catalog_hash = [0u8; 32];
        reader
            .read_exact(&mut catalog_hash)
            .map_err(io_error("Failed to read catalog hash"))?;

        let mut num_tools_bytes = [0u8; 8];
        reader
            .read_exact(&mut num_tools_bytes)
            .map_err(io_error("Failed to read num_tools"))?;
        let num_tools = u64::from_le_bytes(num_tools_bytes) as usize;

        let mut embedding_dim_bytes = [0u8; 8];
        reader
            .read_exact(&mut embedding_dim_bytes)
            .map_err(io_error("Failed to read embedding_dim"))?;
        let embedding_dim = u64::from_le_bytes(embedding_dim_bytes) as usize;

        let total_floats = num_tools
            .checked_mul(embedding_dim)
            .ok_or_else(|| AppError::CacheError("Cache dimensions overflow".to_string()))?;
        let mut data = Vec::with_capacity(total_floats.min(1 << 24));

        for _ in 0..total_floats {
            let mut bytes = [0u8; 4];
            reader
                .read_exact(&mut bytes)
                .map_err(io_error("Failed to read embedding data"))?;
            data.push(f32::from_le_bytes(bytes));
        }

        let embeddings = Array2::from_shape_vec((num_tools, embedding_dim), data)
            .map_err(|e| AppError::CacheError(format!("Failed to reshape embeddings: {}", e)))?;

        tracing::info!(
            path = %path.display(),
            num_tools,
            embedding_dim,
            "Embeddings cache loaded"
        );

        Ok(Some(Self {
            version,
            catalog_hash,
            num_tools,
            embedding_dim,
            embeddings,
        }))
    }

    pub fn is_valid_for(&self, model_id: &str, tools: &[ToolDescriptor]) -> bool {
        self.catalog_hash == Self::compute_catalog_hash(model_id, tools)
            && self.num_tools == tools.len()
    }
}

/// Try to load embeddings from cache, validating against the current catalog.
///
/// Any read failure is treated as a miss.
pub fn try_load_embeddings_cache(
    cache_path: &Path,
    model_id: &str,
    tools: &[ToolDescriptor],
) -> Option<Array2<f32>> {
    match EmbeddingsCache::load(cache_path) {
        Ok(Some(cache)) if cache.is_valid_for(model_id, tools) => {
            tracing::info!("Using cached embeddings (cache hit)");
            Some(cache.embeddings)
        }
        Ok(Some(_)) => {
            tracing::info!("Cache invalid (catalog or model changed), will recompute");
            None
        }
        Ok(None) => {
            tracing::info!("No cache found, will compute embeddings");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable embeddings cache, will recompute");
            None
        }
    }
}

/// Save computed embeddings to cache.
pub fn save_embeddings_cache(
    cache_path: &Path,
    model_id: &str,
    tools: &[ToolDescriptor],
    embeddings: &Array2<f32>,
) -> Result<()> {
    EmbeddingsCache::new(model_id, tools, embeddings.clone()).save(cache_path)
}

//! # Vector Store
//!
//! The narrow interface the retriever needs — add, search, count, clear —
//! plus the shipped brute-force cosine implementation. Registries hold a few
//! thousand entries at most, so exact search stays well under a millisecond;
//! an ANN store can be dropped in behind the same trait if that changes.
//!
//! The store can persist itself to a JSON file keyed by the SHA-256 of the
//! registry it was built from; a hash mismatch on load forces a rebuild.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{FieldLensError, Result};

/// Normalized metadata stored per entry. List fields are flattened into
/// comma-separated ids so the retriever can post-filter with plain substring
/// membership.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryMeta {
    pub id: String,
    pub name: String,
    pub doc: String,
    pub categories: String,
    pub country: String,
    pub langs: String,
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub meta: EntryMeta,
    pub distance: f32,
}

/// What the retriever needs from any vector store implementation.
pub trait VectorStore: Send + Sync {
    fn add(&mut self, embeddings: Vec<Vec<f32>>, metas: Vec<EntryMeta>, ids: Vec<String>)
        -> Result<()>;
    fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit>;
    fn count(&self) -> usize;
    fn clear(&mut self);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Row {
    id: String,
    meta: EntryMeta,
    embedding: Vec<f32>,
}

/// Exact-search in-memory store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    rows: Vec<Row>,
    /// SHA-256 of the registry file the rows were built from.
    pub registry_hash: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persisted index. Returns `None` when the file is missing,
    /// unreadable or built from a different registry.
    pub fn load_if_fresh<P: AsRef<Path>>(path: P, registry_hash: &str) -> Option<Self> {
        let text = std::fs::read_to_string(path.as_ref()).ok()?;
        let store: MemoryStore = serde_json::from_str(&text).ok()?;
        if store.registry_hash == registry_hash && !store.rows.is_empty() {
            info!(
                "loaded vector index with {} entries from {}",
                store.rows.len(),
                path.as_ref().display()
            );
            Some(store)
        } else {
            None
        }
    }

    /// Persist the index next to its registry hash.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FieldLensError::Output {
                message: format!("creating index directory for {}", path.display()),
                source: e,
            })?;
        }
        let json = serde_json::to_string(self).map_err(|e| FieldLensError::Other(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| FieldLensError::Output {
            message: format!("writing vector index {}", path.display()),
            source: e,
        })
    }
}

impl VectorStore for MemoryStore {
    fn add(
        &mut self,
        embeddings: Vec<Vec<f32>>,
        metas: Vec<EntryMeta>,
        ids: Vec<String>,
    ) -> Result<()> {
        if embeddings.len() != metas.len() || embeddings.len() != ids.len() {
            return Err(FieldLensError::Other(format!(
                "vector store add: {} embeddings, {} metadatas, {} ids",
                embeddings.len(),
                metas.len(),
                ids.len()
            )));
        }
        for ((embedding, meta), id) in embeddings.into_iter().zip(metas).zip(ids) {
            self.rows.push(Row {
                id,
                meta,
                embedding,
            });
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .rows
            .iter()
            .map(|row| SearchHit {
                id: row.id.clone(),
                meta: row.meta.clone(),
                distance: cosine_distance(query, &row.embedding),
            })
            .collect();
        // Tie-break on id so equal distances order deterministically.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        hits
    }

    fn count(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.registry_hash.clear();
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 1.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// SHA-256 of a file, hex-encoded. Used to key persisted indexes to the
/// registry they were built from.
pub fn file_sha256<P: AsRef<Path>>(path: P) -> Result<String> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| FieldLensError::Config {
        message: format!("cannot hash {}: {}", path.as_ref().display(), e),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

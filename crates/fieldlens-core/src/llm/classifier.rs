//! # LLM Classifier
//!
//! Ties the registry, embedder, vector store and chat provider together.
//! Construction builds (or reloads) the vector index; after that the
//! classifier is read-only and answers `classify` calls, retrying transient
//! provider failures with exponential backoff and degrading to a null
//! classification instead of failing the scan.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{FieldLensError, Result};
use crate::llm::embed::Embedder;
use crate::llm::prompt::classification_prompt;
use crate::llm::provider::ChatProvider;
use crate::llm::registry::{entry_text, joined_ids, load_registry};
use crate::llm::retrieve::{RetrievalFilters, Retriever};
use crate::llm::store::{file_sha256, EntryMeta, MemoryStore, VectorStore};

/// Registry entries retrieved per classification.
pub const DEFAULT_TOP_K: usize = 10;

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const COMPLETION_MAX_TOKENS: u32 = 500;

/// Classifier construction parameters.
#[derive(Debug, Clone)]
pub struct LlmClassifierConfig {
    /// Path to the JSONL semantic-type registry.
    pub registry_path: PathBuf,
    /// Where to persist the vector index (`None` = in-memory only).
    pub index_path: Option<PathBuf>,
    pub top_k: usize,
    pub max_retries: usize,
    /// Backoff base: attempt `n` sleeps `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl LlmClassifierConfig {
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        LlmClassifierConfig {
            registry_path: registry_path.into(),
            index_path: None,
            top_k: DEFAULT_TOP_K,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

/// Outcome of one classification.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmClassification {
    /// `None` when the model found no match or every attempt failed.
    pub datatype_id: Option<String>,
    /// Self-reported probability in `[0, 1]`.
    pub confidence: f64,
    pub reason: String,
}

impl LlmClassification {
    fn null(reason: String) -> Self {
        LlmClassification {
            datatype_id: None,
            confidence: 0.0,
            reason,
        }
    }
}

/// Ready-to-query classifier. Shareable across threads once built.
pub struct LlmClassifier {
    store: MemoryStore,
    embedder: Box<dyn Embedder>,
    provider: Box<dyn ChatProvider>,
    config: LlmClassifierConfig,
}

impl LlmClassifier {
    /// Build the classifier: reuse a persisted index when it matches the
    /// registry's content hash, otherwise embed the registry from scratch.
    pub async fn build(
        config: LlmClassifierConfig,
        embedder: Box<dyn Embedder>,
        provider: Box<dyn ChatProvider>,
    ) -> Result<Self> {
        let registry_hash = file_sha256(&config.registry_path)?;

        if let Some(index_path) = &config.index_path {
            if let Some(store) = MemoryStore::load_if_fresh(index_path, &registry_hash) {
                return Ok(LlmClassifier {
                    store,
                    embedder,
                    provider,
                    config,
                });
            }
        }

        let entries = load_registry(&config.registry_path)?;
        if entries.is_empty() {
            return Err(FieldLensError::Config {
                message: format!(
                    "registry {} holds no usable datatypes",
                    config.registry_path.display()
                ),
            });
        }

        let texts: Vec<String> = entries.iter().map(entry_text).collect();
        info!("embedding {} registry entries", texts.len());
        let embeddings = embedder.embed(&texts).await?;

        let mut store = MemoryStore::new();
        store.clear();
        let metas: Vec<EntryMeta> = entries
            .iter()
            .map(|entry| EntryMeta {
                id: entry.id.clone(),
                name: entry.name.clone(),
                doc: entry.doc.clone(),
                categories: joined_ids(&entry.categories),
                country: joined_ids(&entry.country),
                langs: joined_ids(&entry.langs),
            })
            .collect();
        let ids: Vec<String> = entries
            .iter()
            .map(|entry| format!("datatype_{}", entry.id))
            .collect();
        store.add(embeddings, metas, ids)?;
        store.registry_hash = registry_hash;

        if let Some(index_path) = &config.index_path {
            if let Err(err) = store.save(index_path) {
                warn!("could not persist vector index: {}", err);
            }
        }

        info!("vector index built with {} entries", store.count());
        Ok(LlmClassifier {
            store,
            embedder,
            provider,
            config,
        })
    }

    pub fn index_size(&self) -> usize {
        self.store.count()
    }

    /// Classify one field from its name and sample values. Provider and
    /// parse failures are retried with exponential backoff; the final
    /// failure yields a null classification, never an error.
    pub async fn classify(
        &self,
        field_name: &str,
        sample_values: &[String],
        country: Option<&str>,
        lang: Option<&str>,
        categories: Option<&str>,
    ) -> Result<LlmClassification> {
        let retriever = Retriever::new(&self.store, &*self.embedder, self.config.top_k);
        let filters = RetrievalFilters {
            country,
            lang,
            categories,
        };
        let retrieved = retriever
            .retrieve(field_name, sample_values, &filters)
            .await?;
        let prompt = classification_prompt(field_name, sample_values, &retrieved);

        let mut last_error = String::new();
        for attempt in 0..self.config.max_retries {
            match self.provider.complete(&prompt, 0.0, COMPLETION_MAX_TOKENS).await {
                Ok(content) => match parse_classification(&content) {
                    Ok(result) => return Ok(result),
                    Err(err) => {
                        warn!(
                            "unparseable llm response for '{}' (attempt {}): {}",
                            field_name,
                            attempt + 1,
                            err
                        );
                        last_error = err.to_string();
                    }
                },
                Err(err) => {
                    warn!(
                        "llm call failed for '{}' (attempt {}): {}",
                        field_name,
                        attempt + 1,
                        err
                    );
                    last_error = err.to_string();
                }
            }
            if attempt + 1 < self.config.max_retries {
                tokio::time::sleep(self.config.base_delay * 2u32.pow(attempt as u32)).await;
            }
        }
        Ok(LlmClassification::null(last_error))
    }
}

/// Parse a model response into a classification: accept raw JSON or the
/// first `{…}` span inside surrounding prose, tolerate a missing confidence
/// or reason, and clamp confidence into `[0, 1]`.
fn parse_classification(content: &str) -> Result<LlmClassification> {
    let json = extract_json_object(content).ok_or_else(|| FieldLensError::Llm {
        message: format!("no JSON object in response: {}", truncate(content, 200)),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| FieldLensError::Llm {
            message: format!("invalid JSON in response: {}", e),
        })?;

    let datatype_id = match &value["datatype_id"] {
        serde_json::Value::String(s) if !s.is_empty() && s != "null" => Some(s.clone()),
        _ => None,
    };
    let confidence = value["confidence"].as_f64().unwrap_or(0.0).clamp(0.0, 1.0);
    let reason = value["reason"].as_str().unwrap_or_default().to_string();

    Ok(LlmClassification {
        datatype_id,
        confidence,
        reason,
    })
}

fn extract_json_object(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..max]
    }
}

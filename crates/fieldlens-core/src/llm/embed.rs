//! # Embedding Client
//!
//! Generates embeddings over an OpenAI-compatible `/embeddings` endpoint.
//! The trait seam keeps the vector index buildable against any embedding
//! source, including the deterministic stand-ins used in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FieldLensError, Result};

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Per-request timeout for embedding and chat calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI-compatible HTTP embedder.
#[derive(Debug)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, api_key: Option<String>, model: Option<&str>) -> Result<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| FieldLensError::Config {
            message: format!("invalid embedding base url '{}': {}", base_url, e),
        })?;
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| FieldLensError::Embedding {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(HttpEmbedder {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key,
            model: model.unwrap_or(DEFAULT_EMBEDDING_MODEL).to_string(),
            batch_size: 100,
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": batch,
        });
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| FieldLensError::Embedding {
            message: format!("request failed: {}", e),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| FieldLensError::Embedding {
            message: format!("failed to read response: {}", e),
        })?;
        if !status.is_success() {
            return Err(FieldLensError::Embedding {
                message: format!("endpoint returned {}: {}", status, truncate(&text, 300)),
            });
        }

        let parsed: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| FieldLensError::Embedding {
                message: format!("response is not JSON: {}", e),
            })?;
        let data = parsed["data"]
            .as_array()
            .ok_or_else(|| FieldLensError::Embedding {
                message: "response missing data array".to_string(),
            })?;
        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let vector = item["embedding"]
                .as_array()
                .ok_or_else(|| FieldLensError::Embedding {
                    message: "response item missing embedding".to_string(),
                })?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            embeddings.push(vector);
        }
        if embeddings.len() != batch.len() {
            return Err(FieldLensError::Embedding {
                message: format!(
                    "asked for {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                ),
            });
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all.extend(self.embed_batch(batch).await?);
        }
        Ok(all)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..max]
    }
}

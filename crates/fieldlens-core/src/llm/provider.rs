//! # Chat Providers
//!
//! A single OpenAI-compatible chat transport configured per provider preset.
//! Presets differ only in base URL, default model and which `*_API_KEY`
//! variable supplies the key when the caller does not. New providers are a
//! table row, not a subclass.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FieldLensError, Result};
use crate::llm::embed::DEFAULT_HTTP_TIMEOUT;

#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Send one prompt, return the raw completion text.
    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String>;
}

struct ProviderSpec {
    name: &'static str,
    base_url: &'static str,
    default_model: &'static str,
    /// Environment variable consulted only when no key is supplied.
    api_key_env: Option<&'static str>,
}

static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4o-mini",
        api_key_env: Some("OPENAI_API_KEY"),
    },
    ProviderSpec {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        default_model: "openai/gpt-4o-mini",
        api_key_env: Some("OPENROUTER_API_KEY"),
    },
    ProviderSpec {
        name: "perplexity",
        base_url: "https://api.perplexity.ai",
        default_model: "sonar",
        api_key_env: Some("PERPLEXITY_API_KEY"),
    },
    ProviderSpec {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        default_model: "llama3.1",
        api_key_env: None,
    },
    ProviderSpec {
        name: "lmstudio",
        base_url: "http://localhost:1234/v1",
        default_model: "local-model",
        api_key_env: None,
    },
];

/// Construct a provider from its table entry. `base_url`, `model` and
/// `api_key` override the preset; a missing key falls back to the provider's
/// environment variable when it has one.
pub fn create_provider(
    name: &str,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
) -> Result<Box<dyn ChatProvider>> {
    let preset = PROVIDERS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| FieldLensError::Config {
            message: format!(
                "unknown llm provider '{}' (known: {})",
                name,
                PROVIDERS
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })?;

    let api_key = api_key.or_else(|| preset.api_key_env.and_then(|var| std::env::var(var).ok()));
    if api_key.is_none() && preset.api_key_env.is_some() {
        return Err(FieldLensError::Config {
            message: format!(
                "provider '{}' needs an API key (set {} or pass one explicitly)",
                preset.name,
                preset.api_key_env.unwrap_or_default()
            ),
        });
    }

    let base_url = base_url.unwrap_or_else(|| preset.base_url.to_string());
    let parsed = url::Url::parse(&base_url).map_err(|e| FieldLensError::Config {
        message: format!("invalid base url '{}' for provider '{}': {}", base_url, name, e),
    })?;

    let client = reqwest::Client::builder()
        .timeout(timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT))
        .build()
        .map_err(|e| FieldLensError::Llm {
            message: format!("failed to build HTTP client: {}", e),
        })?;

    Ok(Box::new(OpenAiCompatProvider {
        name: preset.name.to_string(),
        client,
        base_url: parsed.as_str().trim_end_matches('/').to_string(),
        api_key,
        model: model.unwrap_or_else(|| preset.default_model.to_string()),
    }))
}

/// Chat-completions transport shared by every preset.
#[derive(Debug)]
struct OpenAiCompatProvider {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| FieldLensError::Llm {
            message: format!("{} request failed: {}", self.name, e),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| FieldLensError::Llm {
            message: format!("{} response unreadable: {}", self.name, e),
        })?;
        if !status.is_success() {
            return Err(FieldLensError::Llm {
                message: format!("{} returned {}: {}", self.name, status, truncate(&text, 300)),
            });
        }

        let parsed: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| FieldLensError::Llm {
                message: format!("{} response is not JSON: {}", self.name, e),
            })?;
        parsed["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(str::to_string)
            .ok_or_else(|| FieldLensError::Llm {
                message: format!("{} response missing choices[0].message.content", self.name),
            })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..max]
    }
}

use anyhow::Context;

use fieldlens_core::config::FieldLensConfig;
use fieldlens_core::llm::registry::{entry_text, joined_ids, load_registry};
use fieldlens_core::llm::store::{file_sha256, EntryMeta, MemoryStore, VectorStore};
use fieldlens_core::llm::{Embedder, HttpEmbedder};
use fieldlens_core::FieldLensError;

use crate::args::IndexArgs;

/// Build the vector index from a registry and persist it, so later hybrid
/// scans start without an embedding pass.
pub async fn run(args: &IndexArgs, config: &FieldLensConfig) -> anyhow::Result<()> {
    let registry_path = args
        .registry
        .clone()
        .or_else(|| config.llm.registry.as_deref().map(|p| config.resolve_path(p)))
        .ok_or_else(|| FieldLensError::Config {
            message: "index needs a registry (--registry or [llm].registry)".to_string(),
        })?;
    let index_path = args
        .index
        .clone()
        .or_else(|| config.llm.index.as_deref().map(|p| config.resolve_path(p)))
        .ok_or_else(|| FieldLensError::Config {
            message: "index needs a target path (--index or [llm].index)".to_string(),
        })?;

    let entries = load_registry(&registry_path)?;
    if entries.is_empty() {
        return Err(FieldLensError::Config {
            message: format!("registry {} holds no usable datatypes", registry_path.display()),
        }
        .into());
    }
    println!("Embedding {} registry entries...", entries.len());

    let api_key = config
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let embedder = HttpEmbedder::new(
        args.embedding_base_url
            .as_deref()
            .or(config.llm.embedding_base_url.as_deref())
            .unwrap_or("https://api.openai.com/v1"),
        api_key,
        args.embedding_model
            .as_deref()
            .or(config.llm.embedding_model.as_deref()),
    )?;

    let texts: Vec<String> = entries.iter().map(entry_text).collect();
    let embeddings = embedder.embed(&texts).await.context("embedding registry")?;

    let mut store = MemoryStore::new();
    store.add(
        embeddings,
        entries
            .iter()
            .map(|entry| EntryMeta {
                id: entry.id.clone(),
                name: entry.name.clone(),
                doc: entry.doc.clone(),
                categories: joined_ids(&entry.categories),
                country: joined_ids(&entry.country),
                langs: joined_ids(&entry.langs),
            })
            .collect(),
        entries
            .iter()
            .map(|entry| format!("datatype_{}", entry.id))
            .collect(),
    )?;
    store.registry_hash = file_sha256(&registry_path)?;
    store.save(&index_path)?;

    println!(
        "Index built with {} entries at {}",
        store.count(),
        index_path.display()
    );
    Ok(())
}

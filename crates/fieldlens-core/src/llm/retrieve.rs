//! # Registry Retrieval
//!
//! Embeds a short query built from the field name and a few sample values,
//! then pulls the nearest registry entries from the vector store. Country,
//! language and category filters are applied after the similarity search,
//! over the comma-separated id lists in entry metadata; the search
//! over-fetches threefold to leave room for filtering.

use tracing::debug;

use crate::error::Result;
use crate::llm::embed::Embedder;
use crate::llm::store::{SearchHit, VectorStore};

/// Sample values folded into the query text.
const MAX_QUERY_SAMPLES: usize = 5;

pub struct Retriever<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a dyn Embedder,
    top_k: usize,
}

/// Post-search metadata filters.
#[derive(Debug, Default, Clone)]
pub struct RetrievalFilters<'a> {
    pub country: Option<&'a str>,
    pub lang: Option<&'a str>,
    pub categories: Option<&'a str>,
}

impl RetrievalFilters<'_> {
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.lang.is_none() && self.categories.is_none()
    }

    fn accepts(&self, hit: &SearchHit) -> bool {
        in_list(self.country, &hit.meta.country)
            && in_list(self.lang, &hit.meta.langs)
            && in_list(self.categories, &hit.meta.categories)
    }
}

fn in_list(wanted: Option<&str>, list: &str) -> bool {
    match wanted {
        None => true,
        Some(value) => {
            let value = value.to_lowercase();
            list.to_lowercase().split(',').any(|item| item == value)
        }
    }
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a dyn VectorStore, embedder: &'a dyn Embedder, top_k: usize) -> Self {
        Retriever {
            store,
            embedder,
            top_k,
        }
    }

    /// Nearest registry entries for one field.
    pub async fn retrieve(
        &self,
        field_name: &str,
        sample_values: &[String],
        filters: &RetrievalFilters<'_>,
    ) -> Result<Vec<SearchHit>> {
        let query = build_query(field_name, sample_values);
        let embeddings = self.embedder.embed(std::slice::from_ref(&query)).await?;
        let Some(query_embedding) = embeddings.first() else {
            return Ok(Vec::new());
        };

        let fetch = if filters.is_empty() {
            self.top_k
        } else {
            self.top_k * 3
        };
        let hits = self.store.search(query_embedding, fetch);
        let filtered: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| filters.accepts(hit))
            .take(self.top_k)
            .collect();
        debug!(
            "retrieved {} entries for field '{}'",
            filtered.len(),
            field_name
        );
        Ok(filtered)
    }
}

fn build_query(field_name: &str, sample_values: &[String]) -> String {
    let mut query = format!("Field: {}", field_name);
    if !sample_values.is_empty() {
        let values: Vec<&str> = sample_values
            .iter()
            .take(MAX_QUERY_SAMPLES)
            .map(String::as_str)
            .collect();
        query.push_str(&format!("\nValues: {}", values.join(", ")));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::store::{EntryMeta, MemoryStore};
    use async_trait::async_trait;

    /// Embeds every text onto a fixed axis so search order is controlled by
    /// the store contents alone.
    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let rows = vec![
            ("email", "en", "", vec![1.0, 0.0]),
            ("inn", "ru", "ru", vec![0.9, 0.1]),
            ("phone", "en", "", vec![0.5, 0.5]),
        ];
        store
            .add(
                rows.iter().map(|(_, _, _, e)| e.clone()).collect(),
                rows.iter()
                    .map(|(id, lang, country, _)| EntryMeta {
                        id: id.to_string(),
                        name: id.to_string(),
                        doc: String::new(),
                        categories: String::new(),
                        country: country.to_string(),
                        langs: lang.to_string(),
                    })
                    .collect(),
                rows.iter().map(|(id, _, _, _)| id.to_string()).collect(),
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_retrieve_orders_and_caps() {
        let store = seeded_store();
        let embedder = FlatEmbedder;
        let retriever = Retriever::new(&store, &embedder, 2);
        let hits = retriever
            .retrieve("email", &[], &RetrievalFilters::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "email");
    }

    #[tokio::test]
    async fn test_lang_filter_applied_post_search() {
        let store = seeded_store();
        let embedder = FlatEmbedder;
        let retriever = Retriever::new(&store, &embedder, 2);
        let filters = RetrievalFilters {
            lang: Some("ru"),
            ..Default::default()
        };
        let hits = retriever.retrieve("tax", &[], &filters).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "inn");
    }

    #[test]
    fn test_query_includes_limited_samples() {
        let samples: Vec<String> = (0..8).map(|i| format!("v{}", i)).collect();
        let query = build_query("code", &samples);
        assert!(query.starts_with("Field: code"));
        assert!(query.contains("v4"));
        assert!(!query.contains("v5"));
    }
}

//! # Prompt Building
//!
//! Assembles the classification prompt: field name, a handful of sample
//! values and the retrieved registry entries, ending with a strict
//! JSON-only output instruction.

use crate::llm::store::SearchHit;

/// Cap on sample values shown in the prompt.
const MAX_PROMPT_SAMPLES: usize = 10;

/// Cap on retrieved entries listed in the prompt.
const MAX_PROMPT_ENTRIES: usize = 10;

/// Build the classification prompt for one field.
pub fn classification_prompt(
    field_name: &str,
    sample_values: &[String],
    retrieved: &[SearchHit],
) -> String {
    let mut parts = vec![
        "You are a semantic data type classifier. Your task is to identify the semantic type of a data field based on its name and sample values.".to_string(),
        String::new(),
        format!("Field Name: {}", field_name),
    ];

    if !sample_values.is_empty() {
        parts.push("Sample Values:".to_string());
        for value in sample_values.iter().take(MAX_PROMPT_SAMPLES) {
            parts.push(format!("  - {}", value));
        }
    }
    parts.push(String::new());

    if retrieved.is_empty() {
        parts.push(
            "Note: No relevant registry entries were found. Please classify based on the field name and sample values."
                .to_string(),
        );
        parts.push(String::new());
    } else {
        parts.push("Relevant Registry Entries:".to_string());
        parts.push(String::new());
        for (i, hit) in retrieved.iter().take(MAX_PROMPT_ENTRIES).enumerate() {
            parts.push(format!("{}. ID: {}", i + 1, hit.meta.id));
            parts.push(format!("   Name: {}", hit.meta.name));
            if !hit.meta.doc.is_empty() {
                parts.push(format!("   Description: {}", hit.meta.doc));
            }
            if !hit.meta.categories.is_empty() {
                parts.push(format!("   Categories: {}", hit.meta.categories));
            }
            if !hit.meta.country.is_empty() {
                parts.push(format!("   Countries: {}", hit.meta.country));
            }
            if !hit.meta.langs.is_empty() {
                parts.push(format!("   Languages: {}", hit.meta.langs));
            }
            parts.push(String::new());
        }
    }

    parts.extend([
        "Instructions:".to_string(),
        "1. Match the field to one of the registry entries above (if provided)".to_string(),
        "2. Return a valid JSON object with the following structure:".to_string(),
        r#"   {"datatype_id": "id_from_registry", "confidence": 0.0-1.0, "reason": "explanation"}"#
            .to_string(),
        "3. If no match is found, return:".to_string(),
        r#"   {"datatype_id": null, "confidence": 0.0, "reason": "explanation"}"#.to_string(),
        "4. Confidence should be between 0.0 and 1.0, where 1.0 means very confident".to_string(),
        String::new(),
        "Output (JSON only, no other text):".to_string(),
    ]);

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::store::EntryMeta;

    fn hit(id: &str, name: &str, doc: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            meta: EntryMeta {
                id: id.to_string(),
                name: name.to_string(),
                doc: doc.to_string(),
                categories: "pii".to_string(),
                country: String::new(),
                langs: "en".to_string(),
            },
            distance: 0.1,
        }
    }

    #[test]
    fn test_prompt_lists_field_and_samples() {
        let prompt = classification_prompt(
            "email",
            &["a@b.com".to_string(), "c@d.com".to_string()],
            &[hit("email", "Email", "Email address")],
        );
        assert!(prompt.contains("Field Name: email"));
        assert!(prompt.contains("  - a@b.com"));
        assert!(prompt.contains("1. ID: email"));
        assert!(prompt.contains("Categories: pii"));
        assert!(prompt.contains("JSON only"));
    }

    #[test]
    fn test_prompt_without_entries_has_fallback_note() {
        let prompt = classification_prompt("odd_field", &[], &[]);
        assert!(prompt.contains("No relevant registry entries"));
        assert!(prompt.contains("datatype_id"));
    }

    #[test]
    fn test_prompt_caps_entries_at_ten() {
        let hits: Vec<SearchHit> = (0..15)
            .map(|i| hit(&format!("t{}", i), "T", ""))
            .collect();
        let prompt = classification_prompt("f", &[], &hits);
        assert!(prompt.contains("10. ID: t9"));
        assert!(!prompt.contains("11. ID: t10"));
    }
}

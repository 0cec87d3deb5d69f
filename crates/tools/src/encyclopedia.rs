//! Encyclopedia tool — stub that returns a Wikipedia-style summary.
//!
//! In production this would hit the Wikipedia REST summary endpoint. The
//! stub extracts the topic from the question and returns a deterministic
//! short article so factual routes can be tested offline.

use crate::stub_hash;
use async_trait::async_trait;
use coxswain_core::error::ToolError;
use coxswain_core::tool::Tool;

pub struct EncyclopediaTool;

#[async_trait]
impl Tool for EncyclopediaTool {
    fn name(&self) -> &str {
        "encyclopedia"
    }

    fn description(&self) -> &str {
        "Fetch a short encyclopedia summary for the topic of a factual question."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let topic = extract_topic(query);
        if topic.is_empty() {
            return Err(ToolError::InvalidInput(
                "No topic found in encyclopedia query".into(),
            ));
        }

        let hash = stub_hash(&topic.to_lowercase());
        let fields = [
            "history",
            "science",
            "geography",
            "culture",
            "technology",
            "mathematics",
        ];
        let field = fields[hash as usize % fields.len()];

        Ok(format!(
            "{topic} — summary ({field}): {topic} is a well-documented subject with \
             an extensive reference article. Key points include its origins, its \
             significance within {field}, and related topics cross-referenced in \
             the encyclopedia. (Article id {:08x})",
            hash
        ))
    }
}

/// Strip the interrogative scaffolding and keep the subject.
fn extract_topic(query: &str) -> String {
    let cleaned = query.trim().trim_end_matches(['?', '.', '!']);
    let lower = cleaned.to_lowercase();

    let prefixes = [
        "what is the ",
        "what is a ",
        "what is ",
        "what are ",
        "who was ",
        "define ",
        "tell me about ",
        "explain ",
    ];
    for prefix in prefixes {
        if lower.starts_with(prefix) {
            return cleaned[prefix.len()..].trim().to_string();
        }
    }
    cleaned.to_string()
}

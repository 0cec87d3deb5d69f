//! General web search tool — stub that returns mock search results.
//!
//! In production this would call a search API (DuckDuckGo instant answers
//! or similar). The stub returns context-aware results for common topics
//! and a deterministic generic list otherwise.

use crate::stub_hash;
use async_trait::async_trait;
use coxswain_core::error::ToolError;
use coxswain_core::tool::Tool;

pub struct GeneralSearchTool;

#[async_trait]
impl Tool for GeneralSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns result titles, URLs, and snippets."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("Empty search query".into()));
        }
        Ok(render_results(query))
    }
}

fn render_results(query: &str) -> String {
    let q = query.to_lowercase();

    // Context-aware results for common topics.
    if q.contains("rust") {
        return "1. The Rust Programming Language — doc.rust-lang.org/book — \
                Rust is a systems language focused on safety, speed, and concurrency.\n\
                2. crates.io — crates.io — The Rust community's package registry.\n\
                3. Rust by Example — doc.rust-lang.org/rust-by-example — Runnable examples."
            .to_string();
    }
    if q.contains("news") {
        return "1. Latest headlines — news.example.com — Top stories updated hourly.\n\
                2. World news roundup — world.example.com — International coverage.\n\
                3. Technology news — tech.example.com — Product launches and research."
            .to_string();
    }

    let hash = stub_hash(&q);
    let encoded = query.replace(' ', "+");
    (1..=3)
        .map(|i| {
            format!(
                "{i}. Result {i} for \"{query}\" — example.com/search?q={encoded}&p={i} — \
                 Snippet {:x} covering the query terms.",
                hash.wrapping_add(i)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_three_results() {
        let out = GeneralSearchTool.invoke("obscure query terms").await.unwrap();
        assert_eq!(out.lines().count(), 3);
    }

    #[tokio::test]
    async fn context_aware_for_known_topics() {
        let out = GeneralSearchTool.invoke("rust programming").await.unwrap();
        assert!(out.contains("doc.rust-lang.org"));
    }

    #[tokio::test]
    async fn deterministic_results() {
        let a = GeneralSearchTool.invoke("same query").await.unwrap();
        let b = GeneralSearchTool.invoke("same query").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_query_rejected() {
        let err = GeneralSearchTool.invoke("   ").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}

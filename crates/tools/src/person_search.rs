//! Person search tool — stub that returns a professional profile lookup.
//!
//! In production this would run a site-scoped web search biased toward
//! professional profiles (LinkedIn first, then general results). The stub
//! extracts the person's name and returns deterministic profile-shaped
//! results.

use crate::stub_hash;
use async_trait::async_trait;
use coxswain_core::error::ToolError;
use coxswain_core::tool::Tool;

pub struct PersonSearchTool;

#[async_trait]
impl Tool for PersonSearchTool {
    fn name(&self) -> &str {
        "person_search"
    }

    fn description(&self) -> &str {
        "Look up a person by name, preferring professional profile sources."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let name = extract_name(query);
        if name.is_empty() {
            return Err(ToolError::InvalidInput(
                "No person name found in query".into(),
            ));
        }

        let hash = stub_hash(&name.to_lowercase());
        let titles = [
            "Software Engineer",
            "Product Manager",
            "Research Scientist",
            "Data Engineer",
            "Designer",
            "Consultant",
        ];
        let companies = [
            "Northwind Labs",
            "Meridian Systems",
            "Halcyon Analytics",
            "Bluewater Tech",
            "Foxglove Robotics",
        ];
        let slug = name.to_lowercase().replace(' ', "-");

        Ok(format!(
            "Top results for \"{name}\":\n\
             1. {name} — {} at {} | linkedin.com/in/{slug}\n\
             2. {name} (@{}) | github.com/{}\n\
             3. \"{name}\" — mentions in recent articles and public talks.",
            titles[hash as usize % titles.len()],
            companies[(hash as usize / 5) % companies.len()],
            slug.replace('-', ""),
            slug.replace('-', ""),
        ))
    }
}

/// Pull a capitalized full name out of a person-lookup question.
fn extract_name(query: &str) -> String {
    let cleaned = query.trim().trim_end_matches(['?', '.', '!']);

    // Longest run of consecutive capitalized words wins.
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let mut best: Vec<&str> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in words {
        let capitalized = word.chars().next().is_some_and(char::is_uppercase)
            && word.chars().skip(1).all(|c| c.is_lowercase() || c == '\'');
        if capitalized && !is_interrogative(word) {
            current.push(word);
            if current.len() > best.len() {
                best = current.clone();
            }
        } else {
            current.clear();
        }
    }
    if best.len() >= 2 { best.join(" ") } else { String::new() }
}

fn is_interrogative(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "who" | "what" | "where" | "is" | "was" | "tell" | "about" | "find" | "search"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_full_name() {
        let out = PersonSearchTool.invoke("Who is Grace Hopper?").await.unwrap();
        assert!(out.contains("Grace Hopper"));
        assert!(out.contains("linkedin.com/in/grace-hopper"));
    }

    #[tokio::test]
    async fn three_part_names_survive() {
        let out = PersonSearchTool
            .invoke("find Ada Augusta Lovelace")
            .await
            .unwrap();
        assert!(out.contains("Ada Augusta Lovelace"));
    }

    #[tokio::test]
    async fn single_word_is_not_a_name() {
        let err = PersonSearchTool.invoke("who is Plato?").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deterministic_per_name() {
        let a = PersonSearchTool.invoke("who is Grace Hopper").await.unwrap();
        let b = PersonSearchTool.invoke("search for Grace Hopper").await.unwrap();
        assert_eq!(a, b);
    }
}

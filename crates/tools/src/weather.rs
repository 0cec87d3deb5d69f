//! Weather tool — stub that returns mock conditions for a location.
//!
//! In production this would call a real weather API (OpenWeatherMap or
//! similar). The stub extracts a location from the query and returns
//! plausible, deterministic conditions so turns can be tested without
//! network access.

use crate::stub_hash;
use async_trait::async_trait;
use coxswain_core::error::ToolError;
use coxswain_core::tool::Tool;

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Look up current weather conditions for a location mentioned in the query."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let location = extract_location(query);
        if location.is_empty() {
            return Err(ToolError::InvalidInput(
                "No location found in weather query".into(),
            ));
        }

        let hash = stub_hash(&location.to_lowercase());
        let conditions = [
            "clear skies",
            "partly cloudy",
            "overcast",
            "light rain",
            "heavy rain",
            "thunderstorms",
            "snow",
            "fog",
        ];
        let temp_c = ((hash % 40) as i32) - 5;
        let humidity = 30 + (hash % 60);
        let wind_kmh = 5 + (hash % 30);

        Ok(format!(
            "Current weather in {location}: {}, {temp_c}°C, humidity {humidity}%, wind {wind_kmh} km/h.",
            conditions[(hash as usize / 7) % conditions.len()],
        ))
    }
}

/// Pull the location out of a free-text weather question.
///
/// Handles the common phrasings ("weather in X", "forecast for X",
/// "how hot is it in X") and falls back to the trailing capitalized words.
fn extract_location(query: &str) -> String {
    let cleaned = query.trim().trim_end_matches(['?', '.', '!']);

    for marker in [" in ", " at ", " for ", " near "] {
        if let Some(pos) = cleaned.to_lowercase().rfind(marker) {
            let tail = cleaned[pos + marker.len()..].trim();
            if !tail.is_empty() {
                return strip_time_suffix(tail).to_string();
            }
        }
    }

    // Fall back to trailing capitalized words ("Tokyo weather").
    let trailing: Vec<&str> = cleaned
        .split_whitespace()
        .rev()
        .take_while(|w| w.chars().next().is_some_and(char::is_uppercase))
        .collect();
    trailing.into_iter().rev().collect::<Vec<_>>().join(" ")
}

fn strip_time_suffix(location: &str) -> &str {
    for suffix in [" today", " tomorrow", " right now", " now", " tonight"] {
        if let Some(stripped) = location.strip_suffix(suffix) {
            return stripped.trim_end();
        }
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_location_after_in() {
        let out = WeatherTool.invoke("What's the weather in Tokyo?").await.unwrap();
        assert!(out.contains("Tokyo"));
        assert!(out.contains("°C"));
    }

    #[tokio::test]
    async fn extracts_location_with_time_suffix() {
        let out = WeatherTool
            .invoke("weather in San Francisco today")
            .await
            .unwrap();
        assert!(out.contains("San Francisco"));
        assert!(!out.contains("today:"));
    }

    #[tokio::test]
    async fn trailing_capitalized_fallback() {
        let out = WeatherTool.invoke("forecast New York").await.unwrap();
        assert!(out.contains("New York"));
    }

    #[tokio::test]
    async fn deterministic_for_same_location() {
        let a = WeatherTool.invoke("weather in London").await.unwrap();
        let b = WeatherTool.invoke("weather in London").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn no_location_is_invalid_input() {
        let err = WeatherTool.invoke("weather").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}

//! Deterministic intent classification for tool routing.
//!
//! Classification is a prioritized list of regex predicates. The first
//! match wins, and general web search is the unconditional fallback, so
//! every message routed here gets exactly one tool:
//!
//! 1. Person lookup — a lookup verb followed by a capitalized full name
//! 2. Weather — weather vocabulary anywhere in the message
//! 3. Encyclopedia — factual question openers ("what is", "define", ...)
//! 4. General web search — everything else
//!
//! The router never fires on its own: the orchestrator only consults it
//! when the request enables web-class tools.

use coxswain_core::tool::ToolRoute;
use regex::Regex;
use std::sync::LazyLock;

/// Lookup verb followed by two or more consecutive capitalized words.
/// The name part is case-sensitive on purpose so "who is the president"
/// does not read as a person lookup.
static PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:[Ww]ho\s+is|[Ww]ho'?s|[Ww]ho\s+was|[Ff]ind|[Ll]ook\s+up|[Ss]earch\s+for|[Tt]ell\s+me\s+about)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)",
    )
    .unwrap()
});

static WEATHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(weather|forecast|temperature|how\s+(?:hot|cold|warm)|raining|snowing|humid(?:ity)?|windy)\b",
    )
    .unwrap()
});

static ENCYCLOPEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(what\s+is|what\s+are|what\s+was|who\s+was|who\s+is|define|explain)\b")
        .unwrap()
});

/// Classify a message into exactly one tool route.
///
/// Deterministic: the same message always yields the same route.
pub fn classify(message: &str) -> ToolRoute {
    if PERSON.is_match(message) {
        ToolRoute::PersonSearch
    } else if WEATHER.is_match(message) {
        ToolRoute::Weather
    } else if ENCYCLOPEDIA.is_match(message) {
        ToolRoute::Encyclopedia
    } else {
        ToolRoute::GeneralSearch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_lookup_needs_a_capitalized_name() {
        assert_eq!(classify("Who is Grace Hopper?"), ToolRoute::PersonSearch);
        assert_eq!(classify("tell me about Alan Turing"), ToolRoute::PersonSearch);
        assert_eq!(classify("look up Margaret Hamilton please"), ToolRoute::PersonSearch);
    }

    #[test]
    fn lowercase_subject_is_not_a_person() {
        // "who is" without a proper name falls through to encyclopedia.
        assert_eq!(classify("who is the president"), ToolRoute::Encyclopedia);
    }

    #[test]
    fn weather_vocabulary_routes_to_weather() {
        assert_eq!(classify("What's the weather in Tokyo?"), ToolRoute::Weather);
        assert_eq!(classify("is it raining in Oslo"), ToolRoute::Weather);
        assert_eq!(classify("how hot is it in Cairo today"), ToolRoute::Weather);
    }

    #[test]
    fn weather_outranks_encyclopedia() {
        // Starts like a factual question but mentions weather.
        assert_eq!(classify("What is the forecast for Berlin?"), ToolRoute::Weather);
    }

    #[test]
    fn person_outranks_weather() {
        assert_eq!(
            classify("Who is Anders Celsius and what temperature scale did he invent?"),
            ToolRoute::PersonSearch
        );
    }

    #[test]
    fn factual_openers_route_to_encyclopedia() {
        assert_eq!(classify("What is photosynthesis?"), ToolRoute::Encyclopedia);
        assert_eq!(classify("define entropy"), ToolRoute::Encyclopedia);
        assert_eq!(classify("  explain quicksort"), ToolRoute::Encyclopedia);
    }

    #[test]
    fn everything_else_falls_back_to_general_search() {
        assert_eq!(classify("latest rust release notes"), ToolRoute::GeneralSearch);
        assert_eq!(classify("best pizza near the station"), ToolRoute::GeneralSearch);
    }

    #[test]
    fn classification_is_deterministic() {
        let message = "What's the weather in Tokyo?";
        assert_eq!(classify(message), classify(message));
    }
}

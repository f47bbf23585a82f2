//! Query classification
//!
//! Pure keyword/regex heuristics over the raw user message and the recent
//! turn list. Nothing here performs I/O or touches shared state.

use crate::llm::Message;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Weather vocabulary, matched on word boundaries so "hotel" is not "hot"
static WEATHER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:weather|temperatures?|forecasts?|climate|rain(?:y|ing)?|snow(?:y|ing)?|sunny|cloudy|hot|cold|humidity|humid|wind(?:y)?)\b",
    )
    .expect("weather pattern is valid")
});

const TRAVEL_KEYWORDS: &[&str] = &[
    // Trips and destinations
    "travel",
    "trip",
    "vacation",
    "holiday",
    "destination",
    "tour",
    "sightseeing",
    "visit",
    "explore",
    "journey",
    "getaway",
    "backpack",
    "honeymoon",
    "abroad",
    "overseas",
    "road trip",
    // Lodging
    "hotel",
    "hostel",
    "motel",
    "resort",
    "accommodation",
    "airbnb",
    "lodging",
    "stay",
    "booking",
    "reservation",
    "camping",
    // Transport
    "flight",
    "airline",
    "airport",
    "fly",
    "train",
    "rail",
    "bus",
    "ferry",
    "cruise",
    "car rental",
    "rent a car",
    "taxi",
    "metro",
    "subway",
    "transport",
    "layover",
    // Documents and health
    "passport",
    "visa",
    "customs",
    "insurance",
    "vaccination",
    "embassy",
    // Budgeting
    "itinerary",
    "budget",
    "cost",
    "price",
    "currency",
    "exchange rate",
    "cheap",
    "expensive",
    "tipping",
    // Activities and places
    "restaurant",
    "food",
    "cuisine",
    "dining",
    "beach",
    "museum",
    "attraction",
    "landmark",
    "hike",
    "hiking",
    "ski",
    "island",
    "mountain",
    "national park",
    "city",
    "country",
    "culture",
    "festival",
    "nightlife",
    "shopping",
    "souvenir",
    // Packing and timing
    "luggage",
    "packing",
    "pack",
    "season",
    "guide",
    "local",
    // Conditions at the destination
    "weather",
    "temperature",
    "forecast",
    "climate",
];

const COMPLEX_KEYWORDS: &[&str] = &[
    "plan",
    "itinerary",
    "budget",
    "compare",
    "comparison",
    "recommend",
    "best",
    "trade-off",
    "tradeoff",
    "pros and cons",
    "versus",
    " vs ",
    "which is better",
    "should i",
    "multi-city",
    "route",
    "optimize",
    "step by step",
];

const FOLLOW_UP_PHRASES: &[&str] = &[
    "what about",
    "how about",
    "tell me more",
    "more about",
    "what else",
    "more details",
    "you mentioned",
    "you said",
    "as you said",
    "the first one",
    "the second one",
    "the last one",
    "elaborate",
    "expand on",
    "and also",
];

/// Messages at or under this many words count as follow-ups once history exists
const FOLLOW_UP_MAX_WORDS: usize = 15;

/// Turns inspected when deciding whether the conversation is already complex
const RECENT_TURNS: usize = 4;

/// Ordered city patterns; the first capture wins.
static CITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Capitalised place names, possibly multi-word ("New York")
        r"(?i:weather|temperature|forecast)(?:\s+like)?\s+(?i:in|at|for)\s+([A-Z][\p{L}'-]*(?:\s+[A-Z][\p{L}'-]*)*)",
        // Any single word after the preposition ("weather in paris")
        r"(?i)(?:weather|temperature|forecast)(?:\s+like)?\s+(?:in|at|for)\s+([\p{L}][\p{L}'-]*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("city pattern is valid"))
    .collect()
});

/// Capitalised words that start sentences rather than name places
const NON_CITY_WORDS: &[&str] = &[
    "how", "what", "whats", "where", "when", "why", "who", "which", "will", "would", "could",
    "should", "can", "is", "are", "was", "does", "did", "the", "this", "that", "these", "those",
    "tell", "please", "hey", "hello", "thanks", "thank", "any", "give", "show", "today",
    "tomorrow", "tonight", "weather", "temperature", "forecast", "and", "but", "for", "with",
    "next", "my", "our", "your", "i'm",
];

/// Per-message classification flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_weather_query: bool,
    pub is_travel_query: bool,
    pub needs_chain_of_thought: bool,
    pub is_follow_up: bool,
    pub has_recent_complex_conversation: bool,
    pub city: Option<String>,
}

impl Classification {
    /// Use the structured reasoning prompt for this message
    pub fn wants_reasoning_prompt(&self) -> bool {
        self.needs_chain_of_thought || (self.is_follow_up && self.has_recent_complex_conversation)
    }
}

/// Run every classifier over `text` in the context of `history`
pub fn classify(text: &str, history: &[Message]) -> Classification {
    let is_weather_query = is_weather_query(text);
    Classification {
        is_weather_query,
        is_travel_query: is_travel_query(text),
        needs_chain_of_thought: needs_chain_of_thought(text),
        is_follow_up: is_follow_up_question(text, history),
        has_recent_complex_conversation: has_recent_complex_conversation(history),
        city: if is_weather_query {
            extract_city_from_weather_query(text)
        } else {
            None
        },
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

pub fn is_weather_query(text: &str) -> bool {
    WEATHER_PATTERN.is_match(text)
}

/// Travel vocabulary, plus every weather question
pub fn is_travel_query(text: &str) -> bool {
    contains_any(text, TRAVEL_KEYWORDS) || is_weather_query(text)
}

pub fn needs_chain_of_thought(text: &str) -> bool {
    contains_any(text, COMPLEX_KEYWORDS)
}

/// Loose by intent: any short message counts as a follow-up once history exists.
pub fn is_follow_up_question(text: &str, history: &[Message]) -> bool {
    if contains_any(text, FOLLOW_UP_PHRASES) {
        return true;
    }
    text.split_whitespace().count() <= FOLLOW_UP_MAX_WORDS && !history.is_empty()
}

pub fn has_recent_complex_conversation(history: &[Message]) -> bool {
    let start = history.len().saturating_sub(RECENT_TURNS);
    history[start..]
        .iter()
        .any(|m| m.is_user() && needs_chain_of_thought(&m.content))
}

/// Pull a city name out of a weather question, if one can be found
pub fn extract_city_from_weather_query(text: &str) -> Option<String> {
    for pattern in CITY_PATTERNS.iter() {
        if let Some(city) = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|c| !c.is_empty() && !is_non_city_word(c))
        {
            return Some(city.to_string());
        }
    }

    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|w| {
            w.chars().count() > 2
                && w.chars().next().is_some_and(|c| c.is_uppercase())
                && w.chars().all(char::is_alphabetic)
                && !is_non_city_word(w)
        })
        .map(str::to_string)
}

fn is_non_city_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    NON_CITY_WORDS.contains(&lower.as_str())
}

/// Lowercase and collapse whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Word-set Jaccard similarity (|A ∩ B| / |A ∪ B|)
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = word_set(a);
    let b = word_set(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// True when `text` repeats, or nearly repeats, an earlier user turn
pub fn is_duplicate_message(text: &str, history: &[Message], threshold: f64) -> bool {
    let normalized = normalize(text);
    let prior_user = || history.iter().filter(|m| m.is_user());

    if prior_user().any(|m| normalize(&m.content) == normalized) {
        return true;
    }

    prior_user().any(|m| jaccard_similarity(text, &m.content) >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_keywords_match_on_word_boundaries() {
        assert!(is_weather_query("Will it RAIN in Lisbon tomorrow?"));
        assert!(is_weather_query("what's the forecast"));
        assert!(is_weather_query("Is it windy on the coast?"));
        assert!(!is_weather_query("Best hotels in Rome"));
        assert!(!is_weather_query("Window seat or aisle?"));
    }

    #[test]
    fn travel_gate() {
        assert!(is_travel_query("Find me a cheap flight to Bali"));
        assert!(is_travel_query("What's the weather in Tokyo?"));
        assert!(is_travel_query("Do I need a VISA for Brazil?"));
        assert!(!is_travel_query("How are you?"));
        assert!(!is_travel_query("Solve 2x + 3 = 7"));
    }

    #[test]
    fn every_weather_question_passes_the_travel_gate() {
        for q in [
            "Will it rain in Lisbon tomorrow?",
            "Is it sunny in Madrid?",
            "Is it cold in Oslo right now?",
            "How humid is Bangkok in May?",
            "Is it windy in Wellington?",
        ] {
            assert!(is_weather_query(q), "{q}");
            assert!(is_travel_query(q), "{q}");
        }
    }

    #[test]
    fn chain_of_thought_keywords() {
        assert!(needs_chain_of_thought("Plan a 5 day itinerary in Japan"));
        assert!(needs_chain_of_thought("Compare Lisbon and Porto"));
        assert!(needs_chain_of_thought("Train vs plane from Paris to Nice"));
        assert!(!needs_chain_of_thought("Is it sunny in Madrid?"));
    }

    #[test]
    fn follow_up_needs_history_for_short_messages() {
        let history = vec![Message::user("Plan a trip to Peru"), Message::assistant("...")];
        assert!(is_follow_up_question("And in July?", &history));
        assert!(!is_follow_up_question("And in July?", &[]));
        assert!(is_follow_up_question("Tell me more about Cusco", &[]));
    }

    #[test]
    fn long_message_without_phrase_is_not_follow_up() {
        let history = vec![Message::user("hi")];
        let long = "I am travelling with two kids and a dog and we want somewhere quiet near the sea in late spring";
        assert!(!is_follow_up_question(long, &history));
    }

    #[test]
    fn recent_complexity_only_looks_at_last_four_turns() {
        let mut history = vec![Message::user("Plan a two week itinerary for Vietnam")];
        assert!(has_recent_complex_conversation(&history));

        for _ in 0..2 {
            history.push(Message::assistant("Sure"));
            history.push(Message::user("ok"));
        }
        assert!(!has_recent_complex_conversation(&history));
    }

    #[test]
    fn assistant_turns_do_not_make_conversation_complex() {
        let history = vec![Message::assistant("I recommend the best budget plan")];
        assert!(!has_recent_complex_conversation(&history));
    }

    #[test]
    fn extracts_city_after_preposition() {
        assert_eq!(
            extract_city_from_weather_query("What's the weather in Paris?").as_deref(),
            Some("Paris")
        );
        assert_eq!(
            extract_city_from_weather_query("temperature at New York today").as_deref(),
            Some("New York")
        );
        assert_eq!(
            extract_city_from_weather_query("forecast for berlin this weekend").as_deref(),
            Some("berlin")
        );
        assert_eq!(
            extract_city_from_weather_query("weather in Paris again").as_deref(),
            Some("Paris")
        );
    }

    #[test]
    fn falls_back_to_capitalised_word() {
        assert_eq!(
            extract_city_from_weather_query("Is it sunny in Madrid?").as_deref(),
            Some("Madrid")
        );
        assert_eq!(
            extract_city_from_weather_query("Tokyo weather?").as_deref(),
            Some("Tokyo")
        );
        assert_eq!(
            extract_city_from_weather_query("Will it rain in Lisbon tomorrow?").as_deref(),
            Some("Lisbon")
        );
    }

    #[test]
    fn no_city_found() {
        assert_eq!(extract_city_from_weather_query("How are you?"), None);
        assert_eq!(extract_city_from_weather_query("is it cold"), None);
        // Two characters, three bytes
        assert_eq!(extract_city_from_weather_query("is it windy at Öl"), None);
        assert_eq!(
            extract_city_from_weather_query("is it windy at Ærø").as_deref(),
            Some("Ærø")
        );
    }

    #[test]
    fn classify_only_extracts_city_for_weather() {
        let c = classify("Best museums in Vienna", &[]);
        assert!(c.is_travel_query);
        assert!(!c.is_weather_query);
        assert!(c.city.is_none());

        let c = classify("weather in Vienna", &[]);
        assert_eq!(c.city.as_deref(), Some("Vienna"));
    }

    #[test]
    fn reasoning_prompt_for_follow_up_in_complex_conversation() {
        let history = vec![
            Message::user("Compare hostels and hotels in Prague"),
            Message::assistant("..."),
        ];
        let c = classify("and for Budapest?", &history);
        assert!(!c.needs_chain_of_thought);
        assert!(c.wants_reasoning_prompt());
    }

    #[test]
    fn normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize("  Best   Beaches\tin GREECE "), "best beaches in greece");
    }

    #[test]
    fn exact_repeat_is_duplicate() {
        let history = vec![Message::user("Best beaches in Greece")];
        assert!(is_duplicate_message("best  beaches in greece", &history, 0.8));
    }

    #[test]
    fn near_repeat_is_duplicate() {
        let history = vec![Message::user("best beaches in Greece")];
        assert!(is_duplicate_message(
            "best beaches in Greece please",
            &history,
            0.8
        ));
        assert!(!is_duplicate_message("best food in Italy", &history, 0.8));
    }

    #[test]
    fn assistant_turns_are_not_compared() {
        let history = vec![Message::assistant("best beaches in Greece")];
        assert!(!is_duplicate_message("best beaches in Greece", &history, 0.8));
    }

    #[test]
    fn jaccard_edge_cases() {
        assert_eq!(jaccard_similarity("", ""), 0.0);
        assert_eq!(jaccard_similarity("a b", "a b"), 1.0);
        assert!((jaccard_similarity("a b c d", "a b c d e") - 0.8).abs() < 1e-12);
        assert_eq!(jaccard_similarity("Rome?", "rome"), 1.0);
    }
}

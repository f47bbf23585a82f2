//! Conversation history curation
//!
//! Keeps the turn list sent to the model short: repeated weather questions
//! collapse to the latest one per city, exact repeats are dropped, and the
//! remainder is cut to a trailing window.

use super::classifier::{extract_city_from_weather_query, is_weather_query, normalize};
use crate::llm::{Message, Role};
use std::collections::{HashMap, HashSet};

/// Collapse user weather questions to the most recent one per city.
///
/// Non-weather turns keep their original order and come first; retained
/// weather turns follow in the order they were last asked. Weather turns
/// without a recognisable city are dropped.
pub fn consolidate_weather_queries(history: &[Message]) -> Vec<Message> {
    let mut kept = Vec::with_capacity(history.len());
    let mut latest_by_city: HashMap<String, usize> = HashMap::new();

    for (idx, turn) in history.iter().enumerate() {
        if !(turn.is_user() && is_weather_query(&turn.content)) {
            kept.push(turn.clone());
            continue;
        }
        match extract_city_from_weather_query(&turn.content) {
            Some(city) => {
                latest_by_city.insert(city.to_lowercase(), idx);
            }
            None => tracing::debug!("Dropping weather turn without a city: {}", turn.content),
        }
    }

    let mut weather_indices: Vec<usize> = latest_by_city.into_values().collect();
    weather_indices.sort_unstable();
    kept.extend(weather_indices.into_iter().map(|idx| history[idx].clone()));
    kept
}

/// Bound the history to `max_messages` turns.
///
/// No-op when already within budget; otherwise consolidates weather turns,
/// removes exact `(role, normalized content)` repeats keeping the first, and
/// finally keeps only the trailing `max_messages` turns.
pub fn clean_conversation_history(history: &[Message], max_messages: usize) -> Vec<Message> {
    if history.len() <= max_messages {
        return history.to_vec();
    }

    let consolidated = consolidate_weather_queries(history);

    let mut seen: HashSet<(Role, String)> = HashSet::new();
    let mut deduped: Vec<Message> = consolidated
        .into_iter()
        .filter(|turn| seen.insert((turn.role, normalize(&turn.content))))
        .collect();

    if deduped.len() > max_messages {
        deduped.drain(..deduped.len() - max_messages);
    }

    tracing::debug!(
        "Curated history from {} to {} turns (window {})",
        history.len(),
        deduped.len(),
        max_messages
    );
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn contents(turns: &[Message]) -> Vec<&str> {
        turns.iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn consolidates_to_one_turn_per_city() {
        let history = vec![
            Message::user("weather in Paris"),
            Message::user("weather in Rome"),
            Message::user("weather in Paris again"),
        ];
        let consolidated = consolidate_weather_queries(&history);
        assert_eq!(consolidated.len(), 2);
        assert_eq!(
            contents(&consolidated),
            vec!["weather in Rome", "weather in Paris again"]
        );
    }

    #[test]
    fn city_keys_ignore_case() {
        let history = vec![
            Message::user("forecast for lisbon"),
            Message::user("forecast for Lisbon"),
        ];
        let consolidated = consolidate_weather_queries(&history);
        assert_eq!(contents(&consolidated), vec!["forecast for Lisbon"]);
    }

    #[test]
    fn non_weather_turns_come_first_in_order() {
        let history = vec![
            Message::user("weather in Oslo"),
            Message::assistant("It is 3°C in Oslo."),
            Message::user("Best fjord tours?"),
            Message::assistant("Try Geiranger."),
        ];
        let consolidated = consolidate_weather_queries(&history);
        assert_eq!(
            contents(&consolidated),
            vec![
                "It is 3°C in Oslo.",
                "Best fjord tours?",
                "Try Geiranger.",
                "weather in Oslo"
            ]
        );
    }

    #[test]
    fn weather_turn_without_city_is_dropped() {
        let history = vec![Message::user("is it cold"), Message::user("Museums?")];
        let consolidated = consolidate_weather_queries(&history);
        assert_eq!(contents(&consolidated), vec!["Museums?"]);
    }

    #[test]
    fn within_budget_is_untouched() {
        let history = vec![
            Message::user("weather in Paris"),
            Message::user("weather in Paris"),
        ];
        assert_eq!(clean_conversation_history(&history, 8), history);
    }

    #[test]
    fn removes_exact_repeats_keeping_first() {
        let history = vec![
            Message::user("Tips for Kyoto"),
            Message::assistant("Visit early."),
            Message::user("tips  for kyoto"),
            Message::assistant("Visit early."),
        ];
        let cleaned = clean_conversation_history(&history, 3);
        assert_eq!(contents(&cleaned), vec!["Tips for Kyoto", "Visit early."]);
    }

    #[test]
    fn same_text_different_role_is_kept() {
        let history = vec![
            Message::user("Lisbon"),
            Message::assistant("Lisbon"),
            Message::user("Porto"),
        ];
        let cleaned = clean_conversation_history(&history, 2);
        assert_eq!(contents(&cleaned), vec!["Lisbon", "Porto"]);
    }

    #[test]
    fn truncates_to_trailing_window() {
        let history: Vec<Message> = (0..12)
            .map(|i| Message::user(format!("museum tip number {}", i)))
            .collect();
        let cleaned = clean_conversation_history(&history, 8);
        assert_eq!(cleaned.len(), 8);
        assert_eq!(cleaned[0].content, "museum tip number 4");
        assert_eq!(cleaned[7].content, "museum tip number 11");
    }

    fn turn_strategy() -> impl Strategy<Value = Message> {
        let texts = prop::sample::select(vec![
            "weather in Paris",
            "weather in Rome",
            "Weather in paris",
            "is it cold",
            "best hotels in Rome",
            "Best hotels in Rome",
            "tell me more",
            "Sure, here you go.",
        ]);
        (any::<bool>(), texts).prop_map(|(is_user, text)| {
            if is_user {
                Message::user(text)
            } else {
                Message::assistant(text)
            }
        })
    }

    proptest! {
        #[test]
        fn cleaning_is_idempotent(
            history in prop::collection::vec(turn_strategy(), 0..20),
            max in 1usize..12,
        ) {
            let once = clean_conversation_history(&history, max);
            let twice = clean_conversation_history(&once, max);
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.len() <= max);
        }

        #[test]
        fn consolidation_never_grows_history(
            history in prop::collection::vec(turn_strategy(), 0..20),
        ) {
            prop_assert!(consolidate_weather_queries(&history).len() <= history.len());
        }
    }
}

//! End-to-end tests of the chat pipeline with fake model and weather providers

use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use travel_assistant::agent::assistant::DUPLICATE_RESPONSE;
use travel_assistant::agent::classifier::is_travel_query;
use travel_assistant::agent::prompt::REDIRECT_RESPONSE;
use travel_assistant::agent::{ReplyKind, TravelAssistant};
use travel_assistant::config::{Config, WeatherConfig};
use travel_assistant::core::{InMemorySessionStore, SessionStore};
use travel_assistant::llm::{LlmError, LlmProvider, LlmResponse, Message, ToolDefinition};
use travel_assistant::services::weather::MISSING_KEY_MESSAGE;
use travel_assistant::services::{OpenWeatherClient, WeatherProvider};

/// Answers by quoting whatever weather data the user turn carries
#[derive(Default)]
struct EchoLlm {
    calls: AtomicUsize,
    last_user: Mutex<Option<String>>,
}

#[async_trait]
impl LlmProvider for EchoLlm {
    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo-model"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let user = messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.clone())
            .unwrap_or_default();
        *self.last_user.lock().unwrap() = Some(user.clone());

        let text = match user.split_once("[Weather data: ") {
            Some((_, data)) => format!("Right now: {}", data.trim_end_matches(']')),
            None => "Happy to help plan that trip.".to_string(),
        };
        Ok(LlmResponse::Text { text })
    }
}

struct TokyoWeather;

#[async_trait]
impl WeatherProvider for TokyoWeather {
    async fn fetch_weather(&self, city: &str) -> String {
        format!(
            "Current weather in {}: scattered clouds, 18°C (feels like 17°C), humidity 60%, wind speed 3 m/s",
            city
        )
    }
}

fn assistant_with(llm: Arc<EchoLlm>, weather: Arc<dyn WeatherProvider>) -> TravelAssistant {
    TravelAssistant::from_config(
        &Config::default(),
        llm,
        weather,
        Arc::new(InMemorySessionStore::new()),
    )
}

#[tokio::test]
async fn weather_question_mentions_city_conditions_and_gets_fresh_session() {
    let llm = Arc::new(EchoLlm::default());
    let assistant = assistant_with(llm.clone(), Arc::new(TokyoWeather));

    let outcome = assistant
        .chat(None, "What's the weather in Tokyo?")
        .await
        .unwrap();

    assert_eq!(outcome.kind, ReplyKind::Model);
    assert!(outcome.reply.contains("Current weather in Tokyo: scattered clouds, 18°C"));
    assert!(uuid::Uuid::parse_str(&outcome.session_id).is_ok());
    assert_eq!(outcome.message_count, 2);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

    // Reply carries weather data, so no missing-weather penalty applies
    let report = outcome.quality.unwrap();
    assert!(report.flags.is_empty(), "unexpected flags {:?}", report.flags);
}

#[tokio::test]
async fn missing_weather_key_is_relayed_to_the_model() {
    let llm = Arc::new(EchoLlm::default());
    let weather = OpenWeatherClient::new(&WeatherConfig {
        api_key: None,
        ..WeatherConfig::default()
    });
    let assistant = assistant_with(llm.clone(), Arc::new(weather));

    assistant
        .chat(None, "Is it cold in Reykjavik? What's the forecast for Reykjavik")
        .await
        .unwrap();

    let sent = llm.last_user.lock().unwrap().clone().unwrap();
    assert!(sent.contains(MISSING_KEY_MESSAGE));
}

#[tokio::test]
async fn repeated_question_is_answered_once() {
    let llm = Arc::new(EchoLlm::default());
    let assistant = assistant_with(llm.clone(), Arc::new(TokyoWeather));

    let first = assistant
        .chat(Some("s1"), "Best beaches in Greece")
        .await
        .unwrap();
    assert_eq!(first.kind, ReplyKind::Model);

    for repeat in ["best beaches in greece", "  BEST   beaches in Greece ", "best beaches in Greece please"] {
        let outcome = assistant.chat(Some("s1"), repeat).await.unwrap();
        assert_eq!(outcome.kind, ReplyKind::Duplicate, "{repeat}");
        assert_eq!(outcome.reply, DUPLICATE_RESPONSE);
    }

    let other = assistant.chat(Some("s1"), "best food in Italy").await.unwrap();
    assert_eq!(other.kind, ReplyKind::Model);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);

    let stored = assistant.sessions().get("s1").unwrap();
    assert_eq!(stored.turns.len(), 4);
}

#[tokio::test]
async fn sessions_do_not_share_history() {
    let llm = Arc::new(EchoLlm::default());
    let assistant = assistant_with(llm.clone(), Arc::new(TokyoWeather));

    assistant.chat(Some("a"), "Best beaches in Greece").await.unwrap();
    let outcome = assistant.chat(Some("b"), "Best beaches in Greece").await.unwrap();
    assert_eq!(outcome.kind, ReplyKind::Model);
    assert_eq!(outcome.message_count, 2);
    assert_eq!(assistant.sessions().len(), 2);
}

fn off_topic_message() -> impl Strategy<Value = String> {
    "[a-zA-Z?!,. ]{1,40}".prop_filter("must fail the travel gate", |s| {
        !s.trim().is_empty() && !is_travel_query(s)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn off_topic_messages_never_reach_the_model(message in off_topic_message()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let llm = Arc::new(EchoLlm::default());
        let assistant = assistant_with(llm.clone(), Arc::new(TokyoWeather));

        let outcome = rt.block_on(assistant.chat(None, &message)).unwrap();
        prop_assert_eq!(outcome.kind, ReplyKind::Redirect);
        prop_assert_eq!(outcome.reply.as_str(), REDIRECT_RESPONSE);
        prop_assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }
}

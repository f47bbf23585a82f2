//! Travel assistant request pipeline
//!
//! One call to [`TravelAssistant::chat`] validates the message, gates it to
//! the travel domain, short-circuits repeats, enriches weather questions,
//! curates history, calls the model under a timeout and cancellation token,
//! scans the reply and records the exchange in the session.

use super::classifier::{classify, is_duplicate_message, Classification};
use super::history::clean_conversation_history;
use super::prompt::{build_messages, enrich_with_weather, system_prompt, REDIRECT_RESPONSE};
use super::quality::{QualityReport, QualityScanner};
use crate::config::Config;
use crate::core::{ActiveRequests, ChatError, RequestStatus, Session, SessionStore};
use crate::llm::{LlmError, LlmProvider, LlmResponse, Message, ToolCall, ToolDefinition};
use crate::services::WeatherProvider;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Canned reply for a message that repeats an earlier one
pub const DUPLICATE_RESPONSE: &str = "I've already answered that question above. Is there something specific about it you'd like me to know more about, or another part of your trip I can help with?";

/// Name of the weather tool offered when tool calling is enabled
pub const WEATHER_TOOL_NAME: &str = "get_weather";

const DEFAULT_HISTORY_WINDOW: usize = 8;
const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.8;
const BASE_TIMEOUT: Duration = Duration::from_secs(120);
const REASONING_TIMEOUT: Duration = Duration::from_secs(180);
const EXTENDED_TIMEOUT: Duration = Duration::from_secs(240);
const LONG_MESSAGE_WORDS: usize = 40;

/// How a reply was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    /// Generated by the model
    Model,
    /// Off-topic message answered with the canned redirect
    Redirect,
    /// Repeated message answered with the canned duplicate notice
    Duplicate,
}

/// Result of one chat request
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply: String,
    pub session_id: String,
    pub message_count: usize,
    pub kind: ReplyKind,
    /// Present for model replies only
    pub quality: Option<QualityReport>,
}

/// Per-message timeout. Messages that need chain-of-thought get a longer
/// budget, and the longest when they are also long or continue a complex
/// thread. A follow-up alone keeps the base budget.
pub fn timeout_for(classification: &Classification, message: &str) -> Duration {
    if !classification.needs_chain_of_thought {
        return BASE_TIMEOUT;
    }
    if message.split_whitespace().count() > LONG_MESSAGE_WORDS
        || classification.has_recent_complex_conversation
    {
        EXTENDED_TIMEOUT
    } else {
        REASONING_TIMEOUT
    }
}

/// Definition of the weather lookup tool
pub fn weather_tool() -> ToolDefinition {
    ToolDefinition {
        name: WEATHER_TOOL_NAME.to_string(),
        description: "Get the current weather conditions for a city".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, e.g. Tokyo or Paris"
                }
            },
            "required": ["city"]
        }),
    }
}

pub struct TravelAssistant {
    llm: Arc<dyn LlmProvider>,
    weather: Arc<dyn WeatherProvider>,
    sessions: Arc<dyn SessionStore>,
    requests: Arc<ActiveRequests>,
    scanner: QualityScanner,
    history_window: usize,
    duplicate_threshold: f64,
    fixed_timeout: Option<Duration>,
    use_tools: bool,
}

impl TravelAssistant {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        weather: Arc<dyn WeatherProvider>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            llm,
            weather,
            sessions,
            requests: Arc::new(ActiveRequests::new()),
            scanner: QualityScanner::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            fixed_timeout: None,
            use_tools: false,
        }
    }

    pub fn from_config(
        config: &Config,
        llm: Arc<dyn LlmProvider>,
        weather: Arc<dyn WeatherProvider>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self::new(llm, weather, sessions)
            .with_scanner(QualityScanner::from_config(&config.assistant))
            .with_history_window(config.session.history_window)
            .with_duplicate_threshold(config.assistant.duplicate_threshold)
            .with_timeout(config.assistant.request_timeout_secs.map(Duration::from_secs))
            .with_tools(config.llm.use_tools)
    }

    pub fn with_scanner(mut self, scanner: QualityScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.max(1);
        self
    }

    pub fn with_duplicate_threshold(mut self, threshold: f64) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    /// Fixed per-request timeout; `None` picks one per message
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fixed_timeout = timeout;
        self
    }

    /// Offer `get_weather` as a tool instead of pre-fetching weather
    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.use_tools = enabled;
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub fn new_session(&self) -> Session {
        let session = self.sessions.create();
        tracing::info!("Started new session {}", session.id);
        session
    }

    pub fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions.get(id)
    }

    /// Delete a session, cancelling its active request first.
    ///
    /// Returns `None` when the session does not exist, otherwise whether a
    /// request was cancelled.
    pub fn delete_session(&self, id: &str) -> Option<bool> {
        let cancelled = self.requests.cancel(id);
        if self.sessions.delete(id) {
            tracing::info!("Deleted session {}", id);
            Some(cancelled)
        } else {
            None
        }
    }

    pub fn cancel(&self, session_id: &str) -> bool {
        self.requests.cancel(session_id)
    }

    pub fn request_status(&self, session_id: &str) -> RequestStatus {
        self.requests.status(session_id)
    }

    /// Answer one user message within `session_id`, creating the session
    /// when it is absent or unknown.
    pub async fn chat(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<ChatOutcome, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mut session = self.sessions.get_or_create(session_id);
        let classification = classify(message, &session.turns);
        tracing::debug!("Session {} classification: {:?}", session.id, classification);

        if !classification.is_travel_query {
            tracing::info!("Redirecting off-topic message in session {}", session.id);
            return Ok(canned(&session, REDIRECT_RESPONSE, ReplyKind::Redirect));
        }

        if is_duplicate_message(message, &session.turns, self.duplicate_threshold) {
            tracing::info!("Duplicate message in session {}", session.id);
            return Ok(canned(&session, DUPLICATE_RESPONSE, ReplyKind::Duplicate));
        }

        let history = clean_conversation_history(&session.turns, self.history_window);
        let timeout = self
            .fixed_timeout
            .unwrap_or_else(|| timeout_for(&classification, message));

        let guard = self.requests.begin(&session.id);
        tracing::info!(
            "Request {} for session {} (timeout {}s, {} history turns)",
            guard.request_id(),
            session.id,
            timeout.as_secs(),
            history.len()
        );

        let work = tokio::time::timeout(
            timeout,
            self.generate_reply(message, &classification, &history),
        );
        let reply = tokio::select! {
            _ = guard.token().cancelled() => {
                tracing::info!("Request {} cancelled", guard.request_id());
                return Err(ChatError::Cancelled);
            }
            result = work => match result {
                Ok(reply) => reply?,
                Err(_) => {
                    tracing::warn!("Request {} timed out after {:?}", guard.request_id(), timeout);
                    return Err(ChatError::Timeout(timeout));
                }
            },
        };

        let report = self.scanner.scan(message, &reply);
        if !report.flags.is_empty() {
            tracing::debug!(
                "Reply quality {:.2} with flags {:?}",
                report.score,
                report.flags
            );
        }
        let reply = self.scanner.annotate(&reply, &report);

        session.turns = history;
        session.turns.push(Message::user(message));
        session.turns.push(Message::assistant(reply.clone()));
        let outcome = ChatOutcome {
            reply,
            session_id: session.id.clone(),
            message_count: session.message_count(),
            kind: ReplyKind::Model,
            quality: Some(report),
        };
        // Deleted or superseded while the model was running
        if guard.is_cancelled() {
            tracing::info!("Request {} cancelled before save", guard.request_id());
            return Err(ChatError::Cancelled);
        }
        self.sessions.save(session);
        Ok(outcome)
    }

    async fn generate_reply(
        &self,
        message: &str,
        classification: &Classification,
        history: &[Message],
    ) -> Result<String, LlmError> {
        let weather = match (&classification.city, self.use_tools) {
            (Some(city), false) if classification.is_weather_query => {
                Some(self.weather.fetch_weather(city).await)
            }
            _ => None,
        };

        let system = system_prompt(classification, weather.is_some());
        let user_content = match &weather {
            Some(summary) => enrich_with_weather(message, summary),
            None => message.to_string(),
        };
        let messages = build_messages(system, history, user_content);

        if !self.use_tools {
            return expect_text(self.llm.chat(&messages, None).await?);
        }

        let tools = [weather_tool()];
        let calls = match self.llm.chat(&messages, Some(&tools)).await? {
            LlmResponse::Text { text } => return Ok(text),
            LlmResponse::ToolCalls { calls } => calls,
        };

        let mut messages = messages;
        messages.push(Message::assistant_tool_calls(calls.clone()));
        for call in &calls {
            let result = self.execute_tool(call).await;
            messages.push(Message::tool_result(result));
        }
        expect_text(self.llm.chat(&messages, None).await?)
    }

    async fn execute_tool(&self, call: &ToolCall) -> String {
        tracing::debug!("Tool call {} {}", call.name, call.arguments);
        if call.name != WEATHER_TOOL_NAME {
            tracing::warn!("Model requested unknown tool {}", call.name);
            return format!("Unknown tool: {}", call.name);
        }
        let city = call
            .arguments
            .get("city")
            .or_else(|| call.arguments.get("location"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty());
        match city {
            Some(city) => self.weather.fetch_weather(city).await,
            None => "No city was provided for the weather lookup.".to_string(),
        }
    }
}

fn canned(session: &Session, reply: &str, kind: ReplyKind) -> ChatOutcome {
    ChatOutcome {
        reply: reply.to_string(),
        session_id: session.id.clone(),
        message_count: session.message_count(),
        kind,
        quality: None,
    }
}

fn expect_text(response: LlmResponse) -> Result<String, LlmError> {
    match response {
        LlmResponse::Text { text } => Ok(text),
        LlmResponse::ToolCalls { calls } => Err(LlmError::MalformedResponse(format!(
            "unexpected tool call {} after tools were withdrawn",
            calls.first().map(|c| c.name.as_str()).unwrap_or_default()
        ))),
    }
}

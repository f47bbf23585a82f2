//! Ollama LLM provider implementation (local models)

use super::{ChatOptions, LlmError, LlmProvider, LlmResponse, Message, ToolCall, ToolDefinition};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Generate a unique tool call ID for Ollama tool calls
fn generate_tool_call_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("ollama_call_{}", id)
}

#[derive(Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: ChatOptions,
}

/// Model info returned from Ollama's /api/tags endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
}

impl OllamaProvider {
    /// Create a provider from the `[llm]` configuration section
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: ChatOptions::from(config),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is running and reachable
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List available models from Ollama's /api/tags endpoint
    pub async fn list_models(&self) -> Result<Vec<OllamaModelInfo>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }

        #[derive(Deserialize)]
        struct TagsResponse {
            #[serde(default)]
            models: Vec<OllamaModelInfo>,
        }

        let resp: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(resp.models)
    }

    /// Completion-style call against `/api/generate`
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions::from(self.options),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }

        let resp: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        resp.response.ok_or_else(|| {
            LlmError::MalformedResponse("generate response has no `response` field".to_string())
        })
    }

    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|msg| OllamaMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
                tool_calls: if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| OllamaToolCall {
                                function: OllamaToolCallFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
            })
            .collect()
    }

    /// Convert ToolDefinition to native Ollama tool format
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OllamaTool> {
        tools
            .iter()
            .map(|t| OllamaTool {
                type_field: "function".to_string(),
                function: OllamaFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            messages: Self::convert_messages(messages),
            stream: false,
            options: OllamaOptions::from(self.options),
            tools: tools.filter(|t| !t.is_empty()).map(Self::convert_tools),
        }
    }

    async fn send_request(&self, request: OllamaRequest) -> Result<OllamaResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }

        response
            .json::<OllamaResponse>()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))
    }

    /// Turn a raw server body into a provider response.
    ///
    /// Accepts chat-style `{message: {content, tool_calls}}` as well as
    /// completion-style `{response}` bodies.
    fn interpret(response: OllamaResponse, tools_offered: bool) -> Result<LlmResponse, LlmError> {
        let (content, tool_calls) = match (response.message, response.response) {
            (Some(message), _) => (message.content, message.tool_calls),
            (None, Some(text)) => (text, None),
            (None, None) => {
                return Err(LlmError::MalformedResponse(
                    "response has neither `message` nor `response`".to_string(),
                ))
            }
        };

        // Native tool calling
        if let Some(tool_calls) = tool_calls.filter(|calls| !calls.is_empty()) {
            let calls = tool_calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: generate_tool_call_id(),
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect();
            return Ok(LlmResponse::ToolCalls { calls });
        }

        // Fallback: some models print the tool call as JSON text
        if tools_offered {
            if let Some(tool_call) = parse_tool_call(&content) {
                return Ok(LlmResponse::ToolCalls {
                    calls: vec![tool_call],
                });
            }
        }

        Ok(LlmResponse::Text { text: content })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse, LlmError> {
        let request = self.build_request(messages, tools);
        let tools_offered = request.tools.is_some();

        tracing::debug!(
            "Sending {} turns to Ollama model {} (tools: {})",
            request.messages.len(),
            self.model,
            tools_offered
        );

        let response = self.send_request(request).await?;
        Self::interpret(response, tools_offered)
    }
}

/// Parse a `{"tool": "...", "args": {...}}` object embedded in reply text
fn parse_tool_call(content: &str) -> Option<ToolCall> {
    let content = content.trim();

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    let json_str = &content[start..=end];

    #[derive(Deserialize)]
    struct ToolCallJson {
        tool: String,
        #[serde(default)]
        args: serde_json::Value,
    }

    serde_json::from_str::<ToolCallJson>(json_str)
        .ok()
        .map(|tc| ToolCall {
            id: format!("ollama_{}", uuid::Uuid::new_v4().simple()),
            name: tc.tool,
            arguments: tc.args,
        })
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    /// Ollama's name for the generation length cap
    num_predict: u32,
    max_tokens: u32,
}

impl From<ChatOptions> for OllamaOptions {
    fn from(options: ChatOptions) -> Self {
        Self {
            temperature: options.temperature,
            top_p: options.top_p,
            num_predict: options.max_tokens,
            max_tokens: options.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    response: Option<String>,
}

// Native tool calling types
#[derive(Debug, Clone, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    type_field: String,
    function: OllamaFunction,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

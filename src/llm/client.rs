//! Chat-completions client for OpenRouter (OpenAI-compatible).
//!
//! Supports tool-use (function calling): tool definitions go out with the
//! first call of a run, and tool-call requests come back with an opaque
//! correlation id plus an argument JSON string that is parsed here, at the
//! client boundary.

use crate::errors::RelayError;
use crate::types::{AssistantReply, ConversationTurn, ToolCallRequest, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pluggable chat backend, substitutable with a fake in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Issue one chat-completions call over the given turn sequence.
    ///
    /// `tools` may be empty; the follow-up call after a tool round carries
    /// none, matching the original exchange shape.
    async fn chat(
        &self,
        model: &str,
        turns: &[ConversationTurn],
        tools: &[ToolDefinition],
    ) -> Result<AssistantReply, RelayError>;
}

/// Concrete client for the OpenRouter chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<MessagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolPayload<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolPayload<'a> {
    r#type: &'a str,
    function: FunctionPayload<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionPayload<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallPayload {
    id: String,
    r#type: String,
    function: FunctionCallPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCallPayload {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
}

impl From<&ConversationTurn> for MessagePayload {
    fn from(turn: &ConversationTurn) -> Self {
        let tool_calls = if turn.tool_calls.is_empty() {
            None
        } else {
            Some(
                turn.tool_calls
                    .iter()
                    .map(|call| ToolCallPayload {
                        id: call.id.clone(),
                        r#type: "function".into(),
                        function: FunctionCallPayload {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        Self {
            role: turn.role.to_string(),
            content: turn.content.clone(),
            tool_calls,
            tool_call_id: turn.tool_call_id.clone(),
            name: turn.name.clone(),
        }
    }
}

impl OpenRouterClient {
    /// Create a new chat client.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    async fn chat(
        &self,
        model: &str,
        turns: &[ConversationTurn],
        tools: &[ToolDefinition],
    ) -> Result<AssistantReply, RelayError> {
        let url = format!("{}/chat/completions", self.base_url);

        let tool_payloads: Option<Vec<ToolPayload>> = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| ToolPayload {
                        r#type: "function",
                        function: FunctionPayload {
                            name: &t.name,
                            description: &t.description,
                            parameters: &t.parameters,
                        },
                    })
                    .collect(),
            )
        };

        let request = ChatRequest {
            model,
            messages: turns.iter().map(MessagePayload::from).collect(),
            tool_choice: tool_payloads.as_ref().map(|_| "auto"),
            tools: tool_payloads,
        };

        debug!("Chat request to model {} ({} turns)", model, turns.len());

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        parse_response(status, &body)
    }
}

/// Map a raw chat-completions response to an `AssistantReply`.
///
/// Non-2xx status or an undecodable body is a provider error; argument
/// strings that fail to parse fall back to `Value::Null` so a single bad
/// call does not abort the exchange.
fn parse_response(status: u16, body: &str) -> Result<AssistantReply, RelayError> {
    if !(200..300).contains(&status) {
        return Err(RelayError::Provider { status, body: body.to_string() });
    }

    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| RelayError::Provider {
        status,
        body: format!("undecodable response body: {e}"),
    })?;

    let message = match parsed.choices.into_iter().next() {
        Some(choice) => choice.message,
        None => return Ok(AssistantReply::default()),
    };

    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(|tc| {
            let arguments =
                serde_json::from_str(&tc.function.arguments).unwrap_or_default();
            ToolCallRequest { id: tc.id, name: tc.function.name, arguments }
        })
        .collect();

    Ok(AssistantReply { content: message.content, tool_calls })
}

//! Shared types used across the shopkeep relay.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Conversation turns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// One message in the ordered conversation sequence sent to the model.
///
/// Turns are append-only within a single orchestrator run and discarded when
/// it returns. Tool turns carry the correlation id and function name of the
/// tool call they resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Assistant turn echoing the model's reply, including any tool calls.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool turn resolving `call`, carrying the same correlation id.
    pub fn tool(call: &ToolCallRequest, output: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(output.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool calling
// ---------------------------------------------------------------------------

/// A tool call requested by the model.
///
/// The `id` is an opaque correlation token issued by the provider; the
/// argument JSON string is parsed into a `Value` at the client boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Definition of a tool exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The model's reply to one chat-completions call.
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

// ---------------------------------------------------------------------------
// Store outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Success/error envelope produced by the marketplace client.
///
/// Serializes flat: `{"status":"success", ...payload}` on success and
/// `{"status":"error","message":"..."}` on failure. Never mutated after
/// creation; the dispatcher serializes it to text for the tool turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOutcome {
    pub status: OutcomeStatus,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl StoreOutcome {
    pub fn success(payload: Map<String, Value>) -> Self {
        Self { status: OutcomeStatus::Success, payload }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("message".into(), Value::String(message.into()));
        Self { status: OutcomeStatus::Error, payload }
    }

    pub fn is_error(&self) -> bool {
        self.status == OutcomeStatus::Error
    }
}

// ---------------------------------------------------------------------------
// Listings and analytics
// ---------------------------------------------------------------------------

/// A draft listing assembled from model-supplied arguments.
///
/// Title and tags are bounded by truncation, not rejection, when the request
/// payload is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub quantity: u32,
    pub tags: Vec<String>,
}

/// Summary of recent shop sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopAnalytics {
    pub total_sales: u64,
    pub revenue: f64,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_outcome_serializes_flat_with_status_field() {
        let mut payload = Map::new();
        payload.insert("total_sales".into(), json!(3));
        let outcome = StoreOutcome::success(payload);

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["total_sales"], 3);
    }

    #[test]
    fn error_outcome_carries_message() {
        let outcome = StoreOutcome::error("connection refused");
        assert!(outcome.is_error());

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "connection refused");
    }

    #[test]
    fn tool_turn_carries_correlation_id_and_name() {
        let call = ToolCallRequest {
            id: "call_42".into(),
            name: "get_shop_analytics".into(),
            arguments: json!({}),
        };
        let turn = ConversationTurn::tool(&call, "{\"status\":\"success\"}");

        assert_eq!(turn.role, ChatRole::Tool);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_42"));
        assert_eq!(turn.name.as_deref(), Some("get_shop_analytics"));
    }
}

//! Conversation orchestrator: one exchange with the model, with a bounded
//! round of tool calls in between.
//!
//! The conversation is an explicit ordered turn sequence, built fresh per
//! message and discarded when the reply is produced. The tool loop defaults
//! to a single round: tool calls returned by the follow-up response are not
//! executed, the last available content is the reply.

use crate::agent::system_prompt::SYSTEM_PROMPT;
use crate::errors::RelayError;
use crate::etsy::StoreApi;
use crate::llm::ChatBackend;
use crate::tools;
use crate::types::ConversationTurn;
use tracing::{debug, error, info};

const EMPTY_REPLY_FALLBACK: &str = "I didn't get a reply from the model. Please try again.";

/// Orchestrator owning the chat backend and marketplace client.
pub struct StoreAgent<L, S> {
    llm: L,
    store: S,
    model: String,
    max_tool_rounds: u32,
}

impl<L, S> StoreAgent<L, S>
where
    L: ChatBackend,
    S: StoreApi,
{
    pub fn new(llm: L, store: S, model: impl Into<String>, max_tool_rounds: u32) -> Self {
        Self { llm, store, model: model.into(), max_tool_rounds }
    }

    /// Process one user message to completion and return the reply text.
    ///
    /// Never fails: faults during either LLM call are rendered as a
    /// plain-text error reply instead of propagating to the gateway.
    pub async fn run(&self, user_text: &str) -> String {
        match self.converse(user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Conversation failed: {e}");
                format!("Error: {e}")
            }
        }
    }

    async fn converse(&self, user_text: &str) -> Result<String, RelayError> {
        let tool_defs = tools::tool_definitions();
        let mut turns = vec![
            ConversationTurn::system(SYSTEM_PROMPT),
            ConversationTurn::user(user_text),
        ];

        let mut reply = self.llm.chat(&self.model, &turns, &tool_defs).await?;

        let mut round = 0;
        while !reply.tool_calls.is_empty() && round < self.max_tool_rounds {
            let calls = reply.tool_calls.clone();
            info!("Model requested {} tool call(s)", calls.len());
            turns.push(ConversationTurn::assistant(reply.content.clone(), calls.clone()));

            // Every tool call gets exactly one tool turn, carrying its
            // correlation id, before the follow-up call goes out.
            for call in &calls {
                debug!("Tool: {}({})", call.name, call.arguments);
                let output = tools::execute_tool(&self.store, &call.name, &call.arguments).await;
                turns.push(ConversationTurn::tool(call, output));
            }

            round += 1;
            // The follow-up call carries no tool definitions.
            reply = self.llm.chat(&self.model, &turns, &[]).await?;
        }

        if !reply.tool_calls.is_empty() {
            debug!(
                "Dropping {} tool call(s) beyond round {}",
                reply.tool_calls.len(),
                self.max_tool_rounds
            );
        }

        Ok(reply.content.unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssistantReply, ChatRole, ListingDraft, StoreOutcome, ToolCallRequest, ToolDefinition};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend fake replaying a script and recording every call it receives.
    #[derive(Default)]
    struct FakeBackend {
        script: Mutex<VecDeque<Result<AssistantReply, RelayError>>>,
        calls: Mutex<Vec<(Vec<ConversationTurn>, usize)>>,
    }

    impl FakeBackend {
        fn scripted(replies: Vec<Result<AssistantReply, RelayError>>) -> Self {
            Self { script: Mutex::new(replies.into()), calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn chat(
            &self,
            _model: &str,
            turns: &[ConversationTurn],
            tools: &[ToolDefinition],
        ) -> Result<AssistantReply, RelayError> {
            self.calls.lock().unwrap().push((turns.to_vec(), tools.len()));
            self.script.lock().unwrap().pop_front().expect("unscripted chat call")
        }
    }

    #[derive(Default)]
    struct FakeStore {
        fail: bool,
        creates: Mutex<Vec<ListingDraft>>,
        analytics_calls: Mutex<u32>,
    }

    #[async_trait]
    impl StoreApi for FakeStore {
        async fn create_draft_listing(&self, draft: &ListingDraft) -> StoreOutcome {
            self.creates.lock().unwrap().push(draft.clone());
            if self.fail {
                StoreOutcome::error("connection refused")
            } else {
                let mut payload = Map::new();
                payload.insert("data".into(), json!({"listing_id": 101}));
                StoreOutcome::success(payload)
            }
        }

        async fn shop_analytics(&self) -> StoreOutcome {
            *self.analytics_calls.lock().unwrap() += 1;
            if self.fail {
                StoreOutcome::error("connection refused")
            } else {
                let mut payload = Map::new();
                payload.insert("total_sales".into(), json!(2));
                StoreOutcome::success(payload)
            }
        }
    }

    fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest { id: id.into(), name: name.into(), arguments }
    }

    fn content_reply(text: &str) -> AssistantReply {
        AssistantReply { content: Some(text.into()), tool_calls: Vec::new() }
    }

    fn tool_reply(calls: Vec<ToolCallRequest>) -> AssistantReply {
        AssistantReply { content: None, tool_calls: calls }
    }

    #[tokio::test]
    async fn plain_chat_returns_first_response_without_second_call() {
        let backend = FakeBackend::scripted(vec![Ok(content_reply("Hello!"))]);
        let agent = StoreAgent::new(backend, FakeStore::default(), "test-model", 1);

        let reply = agent.run("hello").await;
        assert_eq!(reply, "Hello!");
        assert_eq!(agent.llm.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_request_runs_one_tool_round_then_confirms() {
        let args = json!({
            "title": "Handmade Candle",
            "description": "A hand-poured candle.",
            "price": 15.0,
            "quantity": 4,
            "tags": ["candle"]
        });
        let backend = FakeBackend::scripted(vec![
            Ok(tool_reply(vec![tool_call("call_1", tools::CREATE_DRAFT_LISTING, args)])),
            Ok(content_reply("Done! Your candle is listed as a draft.")),
        ]);
        let agent = StoreAgent::new(backend, FakeStore::default(), "test-model", 1);

        let reply = agent.run("List my handmade candle, price 15, qty 4").await;
        assert_eq!(reply, "Done! Your candle is listed as a draft.");

        let creates = agent.store.creates.lock().unwrap();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].price, 15.0);
        assert_eq!(creates[0].quantity, 4);

        // First call exposes the tool set, the follow-up carries none.
        let calls = agent.llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, 2);
        assert_eq!(calls[1].1, 0);
    }

    #[tokio::test]
    async fn every_tool_call_gets_a_matching_tool_turn() {
        let backend = FakeBackend::scripted(vec![
            Ok(tool_reply(vec![
                tool_call("call_a", tools::GET_SHOP_ANALYTICS, json!({})),
                tool_call("call_b", tools::GET_SHOP_ANALYTICS, json!({})),
            ])),
            Ok(content_reply("Here are your stats.")),
        ]);
        let agent = StoreAgent::new(backend, FakeStore::default(), "test-model", 1);
        agent.run("how are my sales").await;

        let calls = agent.llm.calls.lock().unwrap();
        let followup_turns = &calls[1].0;

        let assistant_idx = followup_turns
            .iter()
            .position(|t| t.role == ChatRole::Assistant)
            .unwrap();
        let tool_ids: Vec<&str> = followup_turns
            .iter()
            .filter(|t| t.role == ChatRole::Tool)
            .map(|t| t.tool_call_id.as_deref().unwrap())
            .collect();

        assert_eq!(tool_ids, vec!["call_a", "call_b"]);
        assert!(followup_turns[assistant_idx].tool_calls.len() == 2);
        assert_eq!(*agent.store.analytics_calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn store_fault_is_narrated_by_the_followup_call() {
        let backend = FakeBackend::scripted(vec![
            Ok(tool_reply(vec![tool_call("call_1", tools::GET_SHOP_ANALYTICS, json!({}))])),
            Ok(content_reply("I couldn't reach your shop right now.")),
        ]);
        let store = FakeStore { fail: true, ..FakeStore::default() };
        let agent = StoreAgent::new(backend, store, "test-model", 1);

        let reply = agent.run("how are my sales").await;
        assert_eq!(reply, "I couldn't reach your shop right now.");

        // The error envelope reached the conversation as a tool turn.
        let calls = agent.llm.calls.lock().unwrap();
        let tool_turn = calls[1].0.iter().find(|t| t.role == ChatRole::Tool).unwrap();
        let envelope: Value =
            serde_json::from_str(tool_turn.content.as_deref().unwrap()).unwrap();
        assert_eq!(envelope["status"], "error");
    }

    #[tokio::test]
    async fn llm_fault_becomes_a_plain_text_error_reply() {
        let backend = FakeBackend::scripted(vec![Err(RelayError::Provider {
            status: 502,
            body: "bad gateway".into(),
        })]);
        let agent = StoreAgent::new(backend, FakeStore::default(), "test-model", 1);

        let reply = agent.run("hello").await;
        assert_eq!(reply, "Error: provider returned 502: bad gateway");
    }

    #[tokio::test]
    async fn tool_calls_beyond_the_final_round_are_not_executed() {
        let backend = FakeBackend::scripted(vec![
            Ok(tool_reply(vec![tool_call("call_1", tools::GET_SHOP_ANALYTICS, json!({}))])),
            Ok(tool_reply(vec![tool_call("call_2", tools::GET_SHOP_ANALYTICS, json!({}))])),
        ]);
        let agent = StoreAgent::new(backend, FakeStore::default(), "test-model", 1);

        let reply = agent.run("how are my sales").await;
        assert_eq!(reply, EMPTY_REPLY_FALLBACK);
        assert_eq!(*agent.store.analytics_calls.lock().unwrap(), 1);
        assert_eq!(agent.llm.calls.lock().unwrap().len(), 2);
    }
}

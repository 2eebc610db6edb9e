// Totems Agent Engine — Anthropic Claude Provider
// Implements the ProviderAdapter golden trait for the native tool-use wire
// protocol: tools are sent as {name, description, input_schema}, the model
// requests them via `tool_use` content blocks, and results go back as
// `tool_result` blocks inside a single user-role message keyed by
// tool_use_id. A turn is final when stop_reason is anything but "tool_use".

use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde_json::{json, Value};

use crate::atoms::constants::DEFAULT_MAX_TOKENS;
use crate::atoms::traits::{ProviderAdapter, ProviderError};
use crate::engine::actions::ActionDescriptor;
use crate::engine::types::{truncate_utf8, ModelReply, ProviderKind, ToolCallRequest, ToolOutcome};

// ── Struct ─────────────────────────────────────────────────────────────────

pub struct AnthropicAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, ProviderKind::Claude.default_base_url().to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        AnthropicAdapter {
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
        }
    }

    fn build_request_body(
        model: &str,
        system_prompt: &str,
        history: &[Value],
        tools: &Value,
    ) -> Value {
        json!({
            "model": model,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "system": system_prompt,
            "tools": tools,
            "messages": history,
        })
    }

    /// Parse a messages-API response into the canonical reply shape.
    fn parse_response(body: &Value) -> Result<ModelReply, ProviderError> {
        let content = body["content"].as_array().ok_or_else(|| {
            ProviderError::Malformed("response has no content array".into())
        })?;

        if body["stop_reason"].as_str() == Some("tool_use") {
            let calls: Vec<ToolCallRequest> = content
                .iter()
                .filter(|block| block["type"] == "tool_use")
                .map(|block| ToolCallRequest {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].to_string(),
                })
                .collect();

            if calls.is_empty() {
                return Err(ProviderError::Malformed(
                    "stop_reason is tool_use but no tool_use blocks present".into(),
                ));
            }

            return Ok(ModelReply::ToolCalls {
                calls,
                assistant_turn: Value::Array(content.clone()),
            });
        }

        let text = content
            .iter()
            .filter(|block| block["type"] == "text")
            .filter_map(|block| block["text"].as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ModelReply::Text {
            content: text,
            raw: Value::Array(content.clone()),
        })
    }
}

// ── ProviderAdapter trait implementation ───────────────────────────────────

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn serialize_actions(&self, actions: &[ActionDescriptor]) -> Value {
        Value::Array(
            actions
                .iter()
                .map(|a| {
                    json!({
                        "name": a.name,
                        "description": a.description,
                        "input_schema": a.input_schema,
                    })
                })
                .collect(),
        )
    }

    // The system prompt travels out-of-band on every request, so the wire
    // history holds user/assistant turns only.
    fn begin_turn(&self, history: &mut Vec<Value>, _system_prompt: &str, user_text: &str) {
        history.push(json!({ "role": "user", "content": user_text }));
    }

    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        history: &[Value],
        tools: &Value,
    ) -> Result<ModelReply, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = Self::build_request_body(model, system_prompt, history, tools);

        info!("[engine] Anthropic request to {} model={}", url, model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let status = status.as_u16();
            let body_text = response.text().await.unwrap_or_default();
            let message = format!("API error {}: {}", status, truncate_utf8(&body_text, 200));
            error!(
                "[engine] Anthropic error {}: {}",
                status,
                truncate_utf8(&body_text, 500)
            );
            return Err(match status {
                401 | 403 => ProviderError::Auth(message),
                429 => ProviderError::RateLimited(message),
                _ => ProviderError::Api { status, message },
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("invalid JSON body: {}", e)))?;

        Self::parse_response(&body)
    }

    fn append_tool_results(
        &self,
        history: &mut Vec<Value>,
        assistant_turn: &Value,
        results: &[ToolOutcome],
    ) {
        history.push(json!({ "role": "assistant", "content": assistant_turn }));

        let blocks: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": r.call_id,
                    "content": r.payload,
                })
            })
            .collect();
        history.push(json!({ "role": "user", "content": blocks }));
    }

    fn append_assistant(&self, history: &mut Vec<Value>, reply: &ModelReply) {
        let raw = match reply {
            ModelReply::Text { raw, .. } => raw,
            ModelReply::ToolCalls { assistant_turn, .. } => assistant_turn,
        };
        history.push(json!({ "role": "assistant", "content": raw }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::actions;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new("test-key".into())
    }

    #[test]
    fn request_body_carries_system_tools_and_history() {
        let tools = adapter().serialize_actions(actions::all());
        let history = vec![json!({"role": "user", "content": "hi"})];
        let body =
            AnthropicAdapter::build_request_body("claude-sonnet-4-5", "SYSTEM", &history, &tools);

        assert_eq!(body["model"], "claude-sonnet-4-5");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["system"], "SYSTEM");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["tools"].as_array().unwrap().len(), actions::all().len());
        // Anthropic schema key is input_schema, not parameters.
        assert!(body["tools"][0]["input_schema"].is_object());
    }

    #[test]
    fn parse_text_response() {
        let body = json!({
            "stop_reason": "end_turn",
            "content": [
                { "type": "text", "text": "Your balance is 5.0000 TEST." }
            ]
        });
        match AnthropicAdapter::parse_response(&body).unwrap() {
            ModelReply::Text { content, .. } => {
                assert_eq!(content, "Your balance is 5.0000 TEST.");
            }
            other => panic!("expected text reply, got {:?}", other),
        }
    }

    #[test]
    fn parse_tool_use_response() {
        let body = json!({
            "stop_reason": "tool_use",
            "content": [
                { "type": "text", "text": "Let me transfer that." },
                {
                    "type": "tool_use",
                    "id": "toolu_01",
                    "name": "transfer_tokens",
                    "input": { "to": "bob", "quantity": "1.0000 TEST" }
                }
            ]
        });
        match AnthropicAdapter::parse_response(&body).unwrap() {
            ModelReply::ToolCalls {
                calls,
                assistant_turn,
            } => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "toolu_01");
                assert_eq!(calls[0].name, "transfer_tokens");
                let args: Value = serde_json::from_str(&calls[0].arguments).unwrap();
                assert_eq!(args["to"], "bob");
                // The full content array (text block included) is preserved
                // for verbatim replay into the history.
                assert_eq!(assistant_turn.as_array().unwrap().len(), 2);
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn parse_multiple_tool_use_blocks_in_order() {
        let body = json!({
            "stop_reason": "tool_use",
            "content": [
                { "type": "tool_use", "id": "t1", "name": "view_balances", "input": {} },
                { "type": "tool_use", "id": "t2", "name": "get_fee", "input": {} }
            ]
        });
        match AnthropicAdapter::parse_response(&body).unwrap() {
            ModelReply::ToolCalls { calls, .. } => {
                assert_eq!(calls[0].id, "t1");
                assert_eq!(calls[1].id, "t2");
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_missing_content() {
        let body = json!({ "stop_reason": "end_turn" });
        assert!(AnthropicAdapter::parse_response(&body).is_err());
    }

    #[test]
    fn tool_results_are_typed_blocks_in_one_user_message() {
        let adapter = adapter();
        let mut history = vec![json!({"role": "user", "content": "send it"})];
        let assistant_turn = json!([
            { "type": "tool_use", "id": "toolu_01", "name": "transfer_tokens",
              "input": { "to": "bob", "quantity": "1.0000 TEST" } }
        ]);
        let results = vec![ToolOutcome {
            call_id: "toolu_01".into(),
            payload: r#"{"transactionId":"abc123"}"#.into(),
        }];

        adapter.append_tool_results(&mut history, &assistant_turn, &results);

        assert_eq!(history.len(), 3);
        assert_eq!(history[1]["role"], "assistant");
        assert_eq!(history[2]["role"], "user");
        let blocks = history[2]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "tool_result");
        assert_eq!(blocks[0]["tool_use_id"], "toolu_01");
        assert_eq!(blocks[0]["content"], r#"{"transactionId":"abc123"}"#);
    }

    #[test]
    fn begin_turn_does_not_inject_system_message() {
        let adapter = adapter();
        let mut history = Vec::new();
        adapter.begin_turn(&mut history, "SYSTEM", "hello");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["role"], "user");
    }
}

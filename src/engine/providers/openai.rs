// Totems Agent Engine — OpenAI-Compatible Provider
// Handles OpenAI, Ollama, Chutes, and any OpenAI-compatible REST API.
// Implements the ProviderAdapter golden trait for the function-call wire
// protocol: tools are {type:"function", function:{…}}, the system prompt is
// the first history message (refreshed each turn — session info can change
// between messages), the assistant's tool-call message must be replayed
// verbatim before the role:"tool" result messages keyed by tool_call_id,
// and a turn is final when finish_reason is anything but "tool_calls".

use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde_json::{json, Value};

use crate::atoms::constants::DEFAULT_MAX_TOKENS;
use crate::atoms::traits::{ProviderAdapter, ProviderError};
use crate::engine::actions::ActionDescriptor;
use crate::engine::types::{truncate_utf8, ModelReply, ProviderKind, ToolCallRequest, ToolOutcome};

// ── Struct ─────────────────────────────────────────────────────────────────

pub struct OpenAiAdapter {
    client: Client,
    kind: ProviderKind,
    base_url: String,
    api_key: String,
}

impl OpenAiAdapter {
    pub fn new(kind: ProviderKind, api_key: String) -> Self {
        Self::with_base_url(kind, api_key, kind.default_base_url().to_string())
    }

    pub fn with_base_url(kind: ProviderKind, api_key: String, base_url: String) -> Self {
        OpenAiAdapter {
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            kind,
            base_url,
            api_key,
        }
    }

    fn build_request_body(model: &str, history: &[Value], tools: &Value) -> Value {
        json!({
            "model": model,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "messages": history,
            "tools": tools,
        })
    }

    /// Parse a chat-completions response into the canonical reply shape.
    fn parse_response(body: &Value) -> Result<ModelReply, ProviderError> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| ProviderError::Malformed("response has no choices".into()))?;
        let message = &choice["message"];

        let has_tool_calls = choice["finish_reason"].as_str() == Some("tool_calls")
            && message["tool_calls"]
                .as_array()
                .map(|a| !a.is_empty())
                .unwrap_or(false);

        if has_tool_calls {
            // Some local models omit tool_call ids; backfill them in the
            // assistant message itself so the role:"tool" replies keyed by
            // the same id still line up.
            let mut assistant_turn = message.clone();
            if let Some(tool_calls) = assistant_turn["tool_calls"].as_array_mut() {
                for tc in tool_calls.iter_mut() {
                    if tc["id"].as_str().map(str::is_empty).unwrap_or(true) {
                        tc["id"] = Value::String(format!("call_{}", uuid::Uuid::new_v4()));
                    }
                }
            }

            let tool_calls = assistant_turn["tool_calls"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            let calls: Vec<ToolCallRequest> = tool_calls
                .iter()
                .filter(|tc| {
                    // Unknown call types (future API surface) are skipped.
                    tc["type"].as_str().map(|t| t == "function").unwrap_or(true)
                })
                .map(|tc| {
                    let arguments = match &tc["function"]["arguments"] {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    ToolCallRequest {
                        id: tc["id"].as_str().unwrap_or_default().to_string(),
                        name: tc["function"]["name"].as_str().unwrap_or_default().to_string(),
                        arguments,
                    }
                })
                .collect();

            if calls.is_empty() {
                return Err(ProviderError::Malformed(
                    "finish_reason is tool_calls but no function calls present".into(),
                ));
            }

            return Ok(ModelReply::ToolCalls {
                calls,
                assistant_turn,
            });
        }

        let content = message["content"].as_str().unwrap_or_default().to_string();
        Ok(ModelReply::Text {
            content,
            raw: message.clone(),
        })
    }

    fn system_message(system_prompt: &str) -> Value {
        json!({ "role": "system", "content": system_prompt })
    }
}

// ── ProviderAdapter trait implementation ───────────────────────────────────

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Chutes => "chutes",
            ProviderKind::Claude => "openai-compatible",
        }
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn serialize_actions(&self, actions: &[ActionDescriptor]) -> Value {
        Value::Array(
            actions
                .iter()
                .map(|a| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": a.name,
                            "description": a.description,
                            "parameters": a.input_schema,
                        }
                    })
                })
                .collect(),
        )
    }

    // System prompt lives at history[0]; refresh it every turn in case the
    // logged-in identity changed since the conversation started.
    fn begin_turn(&self, history: &mut Vec<Value>, system_prompt: &str, user_text: &str) {
        if history.is_empty() {
            history.push(Self::system_message(system_prompt));
        } else {
            history[0] = Self::system_message(system_prompt);
        }
        history.push(json!({ "role": "user", "content": user_text }));
    }

    async fn complete(
        &self,
        model: &str,
        _system_prompt: &str,
        history: &[Value],
        tools: &Value,
    ) -> Result<ModelReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = Self::build_request_body(model, history, tools);

        info!("[engine] {} request to {} model={}", self.name(), url, model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
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
                "[engine] {} error {}: {}",
                self.name(),
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
        // The provider rejects the next request if the tool-call message
        // itself is missing from history, so replay it verbatim first.
        history.push(assistant_turn.clone());
        for result in results {
            history.push(json!({
                "role": "tool",
                "tool_call_id": result.call_id,
                "content": result.payload,
            }));
        }
    }

    fn append_assistant(&self, history: &mut Vec<Value>, reply: &ModelReply) {
        match reply {
            ModelReply::Text { content, .. } => {
                history.push(json!({ "role": "assistant", "content": content }));
            }
            ModelReply::ToolCalls { assistant_turn, .. } => {
                history.push(assistant_turn.clone());
            }
        }
    }
}

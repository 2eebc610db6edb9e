// Totems Agent Engine — Core types
// These are the data structures that flow through the entire engine.
// They are independent of any specific AI provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Model / Provider Config ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    OpenAi,
    Ollama,
    Chutes,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &str {
        match self {
            ProviderKind::Claude => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434/v1",
            ProviderKind::Chutes => "https://llm.chutes.ai/v1",
        }
    }
}

/// The active AI provider selection, as persisted by the ConfigStore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub provider: ProviderKind,
    pub model: String,
    /// Absent for Ollama (which accepts any placeholder key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// ── Session identity ───────────────────────────────────────────────────

/// Who is logged in, as reported by the Ledger. Feeds the system prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub account_name: String,
    pub chain_id: String,
    pub chain_label: String,
}

// ── Canonical model reply ──────────────────────────────────────────────
// The provider adapters parse each wire response into this shape; the agent
// loop never sees provider-specific JSON.

#[derive(Debug, Clone)]
pub enum ModelReply {
    /// Final text — the loop terminates and returns `content`.
    /// `raw` is the provider-native assistant payload, kept so the adapter
    /// can append it to its own wire history verbatim.
    Text { content: String, raw: Value },
    /// The model wants tools run. `assistant_turn` is the provider-native
    /// assistant message that requested them — it must be appended to the
    /// wire history unchanged before any results, or the next request is
    /// rejected by the provider.
    ToolCalls {
        calls: Vec<ToolCallRequest>,
        assistant_turn: Value,
    },
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON string. The tool executor parses it, so a model that emits
    /// garbage gets an error result fed back instead of crashing the loop.
    pub arguments: String,
}

/// The serialized result of one tool invocation, keyed for the provider.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub call_id: String,
    pub payload: String,
}

// ── Transcript (display-oriented, provider-independent) ────────────────
// What the chat UI renders. Grows one turn per user message, per executed
// tool call, and per assistant reply; cleared on logout/lock/clear-chat.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    pub created_at: String,
}

/// One executed tool call as shown in the transcript: the literal arguments
/// the model sent and the parsed result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: Value,
    pub result: Value,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::plain("user", text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain("assistant", text)
    }

    /// An assistant turn that records a tool call instead of prose.
    pub fn tool_call(record: ToolCallRecord) -> Self {
        ChatTurn {
            role: "assistant".into(),
            content: String::new(),
            tool_calls: Some(vec![record]),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn plain(role: &str, text: impl Into<String>) -> Self {
        ChatTurn {
            role: role.into(),
            content: text.into(),
            tool_calls: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ── Ledger data model ──────────────────────────────────────────────────
// Row shapes for the chain queries the agent exposes. Chain-defined payloads
// with no stable schema (fee table, account info, transaction traces) stay
// as raw `Value`.

/// Receipt for a signed write action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxReceipt {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRow {
    pub balance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotemRow {
    pub creator: String,
    pub supply: String,
    pub max_supply: String,
    pub details: Value,
    pub mods: Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotemPage {
    pub rows: Vec<TotemRow>,
    pub more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotemStatsRow {
    pub ticker: String,
    pub mints: u64,
    pub burns: u64,
    pub transfers: u64,
    pub holders: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModRow {
    pub contract: String,
    pub seller: String,
    pub price: f64,
    pub details: Value,
    pub hooks: Vec<String>,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModPage {
    pub rows: Vec<ModRow>,
    pub more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderRow {
    pub account: String,
    pub balance: String,
}

// ── String helpers ─────────────────────────────────────────────────────

/// Truncate to at most `max_bytes`, respecting UTF-8 char boundaries.
/// Used to keep provider error bodies out of log/message bloat.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProviderKind::Claude).unwrap(),
            "\"claude\""
        );
        let k: ProviderKind = serde_json::from_str("\"chutes\"").unwrap();
        assert_eq!(k, ProviderKind::Chutes);
    }

    #[test]
    fn default_base_urls() {
        assert_eq!(
            ProviderKind::Ollama.default_base_url(),
            "http://localhost:11434/v1"
        );
        assert!(ProviderKind::Claude.default_base_url().contains("anthropic"));
    }

    #[test]
    fn chat_turn_tool_calls_omitted_when_none() {
        let turn = ChatTurn::user("hello");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn tx_receipt_uses_camel_case_wire_name() {
        let receipt = TxReceipt {
            transaction_id: "abc123".into(),
        };
        let json = serde_json::to_string(&receipt).unwrap();
        assert_eq!(json, r#"{"transactionId":"abc123"}"#);
    }

    #[test]
    fn truncate_utf8_respects_boundaries() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // 'é' is two bytes — cutting mid-char must back off.
        assert_eq!(truncate_utf8("é", 1), "");
    }
}

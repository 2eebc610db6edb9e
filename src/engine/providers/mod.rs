// Totems Agent Engine — AI Provider Registry
// AnyProvider wraps Box<dyn ProviderAdapter> so adding a new provider
// never requires touching the agent loop — just implement the trait.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

use serde_json::Value;

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::ProviderAdapter;
use crate::engine::actions::ActionDescriptor;
use crate::engine::types::{AiSettings, ModelReply, ProviderKind, ToolOutcome};

// ── Provider factory ───────────────────────────────────────────────────────

/// Type-erased AI provider. Callers hold `AnyProvider` and drive the wire
/// protocol without knowing which concrete backend is in use.
///
/// ┌──────────────────────────────────────────────────────────────────┐
/// │  To add a NEW OpenAI-compatible provider (e.g. a gateway):       │
/// │    • Add the ProviderKind variant + its default_base_url().      │
/// │    • Route it to OpenAiAdapter below.                            │
/// │                                                                  │
/// │  To add a provider with a UNIQUE wire format:                    │
/// │    • Create engine/providers/{name}.rs + impl ProviderAdapter.   │
/// │    • Add a match arm below.                                      │
/// └──────────────────────────────────────────────────────────────────┘
pub struct AnyProvider(Box<dyn ProviderAdapter>);

impl std::fmt::Debug for AnyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AnyProvider").field(&self.0.name()).finish()
    }
}

impl AnyProvider {
    /// Construct the right concrete adapter from the stored settings.
    /// Fails fast with the configuration error the UI shows verbatim.
    pub fn from_settings(settings: &AiSettings) -> EngineResult<Self> {
        let adapter: Box<dyn ProviderAdapter> = match settings.provider {
            ProviderKind::Claude => {
                let api_key = settings.api_key.clone().ok_or_else(|| {
                    EngineError::Config(
                        "Claude API key not configured. Go to Settings to set it up.".into(),
                    )
                })?;
                Box::new(AnthropicAdapter::new(api_key))
            }
            // Ollama runs locally and accepts any placeholder key.
            ProviderKind::Ollama => Box::new(OpenAiAdapter::new(
                ProviderKind::Ollama,
                settings
                    .api_key
                    .clone()
                    .unwrap_or_else(|| "ollama".into()),
            )),
            kind @ (ProviderKind::OpenAi | ProviderKind::Chutes) => {
                let api_key = settings.api_key.clone().ok_or_else(|| {
                    EngineError::Config(
                        "AI provider not configured. Go to Settings to set it up.".into(),
                    )
                })?;
                Box::new(OpenAiAdapter::new(kind, api_key))
            }
        };
        Ok(AnyProvider(adapter))
    }

    /// Wrap a concrete adapter directly. Used by tests to script replies.
    pub fn from_adapter(adapter: Box<dyn ProviderAdapter>) -> Self {
        AnyProvider(adapter)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn kind(&self) -> ProviderKind {
        self.0.kind()
    }

    pub fn serialize_actions(&self, actions: &[ActionDescriptor]) -> Value {
        self.0.serialize_actions(actions)
    }

    pub fn begin_turn(&self, history: &mut Vec<Value>, system_prompt: &str, user_text: &str) {
        self.0.begin_turn(history, system_prompt, user_text);
    }

    /// One completion round-trip. Provider-level failures are promoted to
    /// `EngineError::Provider` here so callers work in `EngineResult`.
    pub async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        history: &[Value],
        tools: &Value,
    ) -> EngineResult<ModelReply> {
        self.0
            .complete(model, system_prompt, history, tools)
            .await
            .map_err(|e| EngineError::provider(self.0.name(), e.to_string()))
    }

    pub fn append_tool_results(
        &self,
        history: &mut Vec<Value>,
        assistant_turn: &Value,
        results: &[ToolOutcome],
    ) {
        self.0.append_tool_results(history, assistant_turn, results);
    }

    pub fn append_assistant(&self, history: &mut Vec<Value>, reply: &ModelReply) {
        self.0.append_assistant(history, reply);
    }
}

// Totems Agent Engine — Agent Session
// The session-scoped context object: one instance per logged-in identity,
// owned by the shell. Everything the conversation mutates lives here — the
// wire history, the display transcript, and the duplicate-guard fingerprints
// — so `reset()` on logout/lock clears them together instead of relying on
// three separately remembered calls.
//
// `send` takes `&mut self`: the compiler enforces the one-in-flight-send
// invariant that the concurrency model requires. A second message arriving
// mid-loop waits on the caller's side, it cannot interleave.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::atoms::constants::DEFAULT_MAX_TOOL_ROUNDS;
use crate::atoms::error::EngineResult;
use crate::atoms::traits::Ledger;
use crate::engine::guard::{ConfirmationGate, ConfirmationRequest};
use crate::engine::providers::AnyProvider;
use crate::engine::tool_executor::ToolExecutor;
use crate::engine::types::{AiSettings, ChatTurn};
use crate::engine::{actions, agent_loop, prompt};

pub struct AgentSession {
    provider: AnyProvider,
    model: String,
    ledger: Arc<dyn Ledger>,
    executor: ToolExecutor,
    gate: Arc<ConfirmationGate>,
    wire_history: Vec<Value>,
    transcript: Vec<ChatTurn>,
    max_tool_rounds: u32,
}

impl AgentSession {
    /// Build a session from the stored provider settings. Fails immediately
    /// (before any request leaves the machine) when no usable provider is
    /// configured.
    pub fn new(settings: &AiSettings, ledger: Arc<dyn Ledger>) -> EngineResult<Self> {
        let provider = AnyProvider::from_settings(settings)?;
        Ok(Self::with_provider(provider, settings.model.clone(), ledger))
    }

    /// Build a session around an existing adapter. Tests use this to script
    /// model replies without touching the network.
    pub fn with_provider(provider: AnyProvider, model: String, ledger: Arc<dyn Ledger>) -> Self {
        let gate = Arc::new(ConfirmationGate::new());
        AgentSession {
            executor: ToolExecutor::new(ledger.clone(), gate.clone()),
            provider,
            model,
            ledger,
            gate,
            wire_history: Vec::new(),
            transcript: Vec::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    // ── Confirmation surface wiring ────────────────────────────────────

    /// Hand the UI the receiving end of the duplicate-confirmation channel.
    /// Until this is called the session is headless and every duplicate is
    /// declined. Dropping the receiver resolves any pending question as
    /// declined.
    pub fn attach_confirmation_surface(&self) -> mpsc::UnboundedReceiver<ConfirmationRequest> {
        self.gate.attach()
    }

    pub fn detach_confirmation_surface(&self) {
        self.gate.detach()
    }

    /// Optional answer deadline; `None` (default) waits as long as the human
    /// takes. Elapsing resolves to declined.
    pub fn set_confirmation_timeout(&self, timeout: Option<Duration>) {
        self.gate.set_timeout(timeout);
    }

    pub fn set_max_tool_rounds(&mut self, rounds: u32) {
        self.max_tool_rounds = rounds;
    }

    // ── Conversation ───────────────────────────────────────────────────

    /// Send a user message and drive the tool-calling loop to completion.
    /// Returns the model's final text.
    pub async fn send(&mut self, user_text: &str) -> EngineResult<String> {
        info!(
            "[engine] User message ({} chars), provider={}",
            user_text.len(),
            self.provider.name()
        );

        self.transcript.push(ChatTurn::user(user_text));

        // Rebuilt every turn — the logged-in identity can change between
        // messages and the prompt must follow it.
        let session_info = self.ledger.session_info();
        let system_prompt = prompt::build_system_prompt(session_info.as_ref());
        let tools = self.provider.serialize_actions(actions::all());

        self.provider
            .begin_turn(&mut self.wire_history, &system_prompt, user_text);

        let reply = agent_loop::run_agent_turn(
            &self.provider,
            &self.model,
            &system_prompt,
            &mut self.wire_history,
            &mut self.transcript,
            &self.executor,
            &tools,
            self.max_tool_rounds,
        )
        .await?;

        self.transcript.push(ChatTurn::assistant(reply.clone()));
        Ok(reply)
    }

    /// The display transcript: user turns, one turn per executed tool call,
    /// assistant turns.
    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Explicit "clear chat": drops the conversation but keeps the
    /// duplicate fingerprints — the session identity is unchanged, so an
    /// already-executed transfer is still a duplicate.
    pub fn clear(&mut self) {
        info!("[engine] Chat cleared");
        self.transcript.clear();
        self.wire_history.clear();
    }

    /// Session teardown for logout/lock/login: conversation, wire history,
    /// and fingerprints are cleared together. The identity backing the
    /// history changes, so a partial clear would be a correctness bug.
    pub fn reset(&mut self) {
        info!("[engine] Session reset");
        self.clear();
        self.executor.guard().reset();
    }
}

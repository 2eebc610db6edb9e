// ── Totems Atoms: Capability Traits ────────────────────────────────────────
// The seams the engine is built against.
//
//   • `ProviderAdapter` — the golden trait every AI wire protocol implements.
//     Two variants ship in engine/providers/: the Anthropic-native tool-use
//     protocol and the OpenAI-compatible function-call protocol (which also
//     serves Ollama and Chutes). The agent loop only ever talks to this
//     trait — provider identity never leaks into it.
//   • `Ledger` — the wallet's blockchain client: signed writes and read-only
//     table queries. Implemented outside this crate (the shell owns keys and
//     session lifecycle); tests use an in-process mock.
//   • `ConfigStore` — persistence for the active provider/model/credential.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::engine::types::{
    AiSettings, BalanceRow, HolderRow, ModPage, ModelReply, ProviderKind, SessionInfo, TotemPage,
    TotemStatsRow, ToolOutcome, TxReceipt,
};

// ── Provider adapter ───────────────────────────────────────────────────────

/// Classified failure from a provider HTTP round-trip.
///
/// Auth and transport failures abort the conversation turn; they are the
/// only errors that escape the agent loop (tool failures are fed back to
/// the model as data).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level failure: DNS, connect, timeout, broken stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// 401 / 403 — the key is wrong or missing. Never worth repeating.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 429 — over quota or rate ceiling.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success HTTP status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered 200 with a body we cannot make sense of.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// One AI wire protocol.
///
/// The wire history (`Vec<Value>`) is owned by the session but only ever
/// shaped by the adapter — the two variants store tool results in
/// incompatible places (typed content blocks vs. `role:"tool"` messages)
/// and the loop must not know which.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Translate the action catalog into this provider's tool schema.
    fn serialize_actions(&self, actions: &[crate::engine::actions::ActionDescriptor]) -> Value;

    /// Prepare the wire history for a new user turn. Variant B upserts the
    /// system prompt as message zero here (session info may have changed);
    /// Variant A sends the system prompt out-of-band on every request.
    fn begin_turn(&self, history: &mut Vec<Value>, system_prompt: &str, user_text: &str);

    /// One request/response round-trip with the model.
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        history: &[Value],
        tools: &Value,
    ) -> Result<ModelReply, ProviderError>;

    /// Append the assistant's tool-call turn verbatim, then the results,
    /// in this provider's wire shape. Results only ever enter as data-typed
    /// turns — never as instruction-channel text.
    fn append_tool_results(
        &self,
        history: &mut Vec<Value>,
        assistant_turn: &Value,
        results: &[ToolOutcome],
    );

    /// Append the final assistant text turn.
    fn append_assistant(&self, history: &mut Vec<Value>, reply: &ModelReply);
}

// ── Ledger ─────────────────────────────────────────────────────────────────

/// Typed failure from the blockchain client.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No signing session — the user is logged out or locked.
    #[error("No active session. Please log in first.")]
    NoSession,

    /// The chain (or the RPC node) rejected the call. Carries the node's
    /// human-readable message: insufficient balance, unknown account, …
    #[error("{0}")]
    Chain(String),
}

/// The wallet's blockchain capability: signed writes against the totems and
/// marketplace contracts, plus read-only table/account queries.
///
/// Every method fails with [`LedgerError::NoSession`] when no identity is
/// active. Quantities are asset strings with fixed precision and symbol
/// (`"10.0000 TEST"`); account names are 1–12 chars of `a-z`, `1-5`, `.`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The logged-in identity, if any. Feeds the system prompt.
    fn session_info(&self) -> Option<SessionInfo>;

    // ── Write actions (signed) ──

    async fn transfer(&self, to: &str, quantity: &str, memo: &str)
        -> Result<TxReceipt, LedgerError>;

    /// Transfer of the chain's system token (eosio.token) rather than a totem.
    async fn transfer_system_token(
        &self,
        to: &str,
        quantity: &str,
        memo: &str,
    ) -> Result<TxReceipt, LedgerError>;

    async fn mint(
        &self,
        mod_account: &str,
        quantity: &str,
        payment: &str,
        memo: &str,
    ) -> Result<TxReceipt, LedgerError>;

    async fn burn(&self, quantity: &str, memo: &str) -> Result<TxReceipt, LedgerError>;

    // ── Read-only queries ──

    async fn get_balances(&self, account: Option<&str>) -> Result<Vec<BalanceRow>, LedgerError>;

    async fn get_system_balances(
        &self,
        account: Option<&str>,
    ) -> Result<Vec<BalanceRow>, LedgerError>;

    async fn list_totems(&self, limit: u32, cursor: Option<&str>)
        -> Result<TotemPage, LedgerError>;

    async fn get_totem_stats(
        &self,
        ticker: Option<&str>,
    ) -> Result<Vec<TotemStatsRow>, LedgerError>;

    async fn list_mods(&self, limit: u32, cursor: Option<&str>) -> Result<ModPage, LedgerError>;

    async fn get_fee(&self) -> Result<Value, LedgerError>;

    async fn get_account_info(&self, account: &str) -> Result<Value, LedgerError>;

    async fn account_exists(&self, account: &str) -> Result<bool, LedgerError>;

    async fn get_transaction(&self, tx_id: &str) -> Result<Value, LedgerError>;

    async fn get_top_holders(
        &self,
        ticker: &str,
        limit: u32,
    ) -> Result<Vec<HolderRow>, LedgerError>;
}

// ── Config store ───────────────────────────────────────────────────────────

/// Persistence for the active AI provider selection. Key encryption at rest
/// is the shell's job — this contract only reads and writes the settings.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> crate::atoms::error::EngineResult<Option<AiSettings>>;
    fn save(&self, settings: &AiSettings) -> crate::atoms::error::EngineResult<()>;
}

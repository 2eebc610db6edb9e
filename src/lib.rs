// Totems Agent Engine — native Rust AI assistant runtime for the Totems
// wallet. Drives provider-agnostic tool-calling conversations against the
// wallet's blockchain Ledger, with a fixed whitelisted action surface and a
// duplicate-transaction confirmation gate on every write the model triggers.
//
// The shell (window UI, IPC, login/keys) lives outside this crate and talks
// to it through three seams:
//   • `Ledger`         — signed writes + read-only chain queries
//   • `ConfigStore`    — which provider/model/credential is active
//   • the confirmation surface — `AgentSession::attach_confirmation_surface`

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::traits::{ConfigStore, Ledger, LedgerError, ProviderAdapter, ProviderError};
pub use engine::actions;
pub use engine::config::{update_ai_settings, FileConfigStore, MemoryConfigStore};
pub use engine::guard::{ConfirmationGate, ConfirmationRequest, DuplicateCheck, DuplicateGuard};
pub use engine::providers::{AnthropicAdapter, AnyProvider, OpenAiAdapter};
pub use engine::sessions::AgentSession;
pub use engine::types::{
    AiSettings, BalanceRow, ChatTurn, HolderRow, ModPage, ModRow, ModelReply, ProviderKind,
    SessionInfo, TotemPage, TotemRow, TotemStatsRow, ToolCallRecord, ToolCallRequest, ToolOutcome,
    TxReceipt,
};

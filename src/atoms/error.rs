// ── Totems Atoms: Error Types ──────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, Provider, Config…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • `EngineError` → `String` conversion is provided via `Display` so that
//     shell boundaries (`Result<T, String>`) can call `.map_err(|e|
//     e.to_string())` without boilerplate.
//   • No variant carries secret material (API keys, private keys) in its message.
//
// Note the one error class that is deliberately ABSENT: tool execution
// failures. Those are serialized into the conversation as `{"error": …}`
// payloads by the tool executor and fed back to the model — they never
// propagate as Rust errors past that boundary.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// AI provider HTTP or API-level failure (non-secret detail only).
    /// These abort the in-flight conversation turn.
    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Engine or provider configuration is invalid or missing.
    /// Surfaced before any request leaves the machine.
    #[error("{0}")]
    Config(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    /// Create a provider error with name and message.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations should return this type.
/// At shell boundaries, convert with `.map_err(|e| e.to_string())`.
pub type EngineResult<T> = Result<T, EngineError>;

// ── Conversion: EngineError → String ───────────────────────────────────────
// Lets shell-side command functions call `.map_err(EngineError::into)` directly.

impl From<EngineError> for String {
    fn from(e: EngineError) -> Self {
        e.to_string()
    }
}

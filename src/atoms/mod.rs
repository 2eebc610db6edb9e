// ── Totems Atoms Layer ─────────────────────────────────────────────────────
// Constants, error types, and the capability traits the engine is built
// against — zero side effects, no I/O. The concrete implementations
// (HTTP providers, the wallet's signing ledger, config files) live in
// engine/ or outside this crate entirely.

pub mod constants;
pub mod error;
pub mod traits;

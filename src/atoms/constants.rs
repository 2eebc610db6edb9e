// ── Totems Atoms: Constants ────────────────────────────────────────────────
// All named constants for the crate live here.
// Rationale: collecting constants in one place eliminates magic strings,
// makes auditing easier, and keeps every layer's code self-documenting.

// ── On-chain contract accounts ─────────────────────────────────────────────
// The totem token contract and the mod marketplace contract. Both are baked
// into the system prompt and into every Ledger call — changing either value
// repoints the whole agent at a different deployment. Treat as stable
// identifiers.
pub const TOTEMS_CONTRACT: &str = "totemstotems";
pub const MARKET_CONTRACT: &str = "modsmodsmods";

// ── Write-action whitelist ─────────────────────────────────────────────────
// The ONLY actions the model may trigger that mutate chain state. The tool
// executor rejects anything else before it reaches the Ledger, and the
// duplicate guard fingerprints exactly this set. Every name listed here must
// have a matching descriptor in engine::actions.
pub const WRITE_ACTIONS: &[&str] = &[
    "transfer_tokens",
    "transfer_eos_tokens",
    "mint_tokens",
    "burn_tokens",
];

// ── Tool-call argument defaults ────────────────────────────────────────────
// Applied before fingerprinting so that "transfer with no memo" and
// "transfer with empty memo" are the same action.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

// ── Model request limits ───────────────────────────────────────────────────
// Used by both provider adapters when building a completion request.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// ── Agent loop cost-control limits ─────────────────────────────────────────
// A model that keeps requesting tools forever would otherwise pin the session
// and burn API spend. The loop stops after this many rounds and returns
// whatever text it has accumulated.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 20;

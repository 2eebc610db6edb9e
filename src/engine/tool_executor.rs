// Totems Agent Engine — Tool Executor
// Executes the actions requested by the AI model. Every call goes through
// here — this is the security enforcement point: registry whitelist,
// argument validation, and the duplicate-transaction gate all sit between
// the model and the Ledger.
//
// Nothing in this module returns Err to the agent loop. Every failure —
// unknown action, malformed arguments, chain rejection, declined
// confirmation — is serialized into a JSON payload and fed back to the
// model as a tool result, so the conversation survives and the model can
// react, narrate, or retry.

use std::sync::Arc;

use log::{info, warn};
use serde_json::{json, Map, Value};

use crate::atoms::constants::DEFAULT_PAGE_LIMIT;
use crate::atoms::traits::{Ledger, LedgerError};
use crate::engine::actions::{self, ActionDescriptor};
use crate::engine::guard::{ConfirmationGate, DuplicateCheck, DuplicateGuard};

pub struct ToolExecutor {
    ledger: Arc<dyn Ledger>,
    guard: DuplicateGuard,
}

impl ToolExecutor {
    pub fn new(ledger: Arc<dyn Ledger>, gate: Arc<ConfirmationGate>) -> Self {
        ToolExecutor {
            ledger,
            guard: DuplicateGuard::new(gate),
        }
    }

    /// The session-scoped duplicate guard (cleared on session teardown).
    pub fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    /// Execute one action and serialize the outcome.
    ///
    /// `raw_arguments` is the argument JSON exactly as the model emitted it.
    /// Always returns a JSON string payload — `{"error": …}` on any failure.
    pub async fn execute(&self, name: &str, raw_arguments: &str) -> String {
        info!(
            "[engine] Executing action: {} args={}",
            name,
            crate::engine::types::truncate_utf8(raw_arguments, 200)
        );

        let Some(descriptor) = actions::get(name) else {
            warn!("[engine] Blocked unregistered action: {}", name);
            return error_payload(format!("Action not allowed: {}", name));
        };

        let parsed: Value = if raw_arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(raw_arguments) {
                Ok(value) => value,
                Err(e) => {
                    return error_payload(format!("Invalid tool arguments: {}", e));
                }
            }
        };

        let args = match normalize_arguments(descriptor, parsed) {
            Ok(args) => args,
            Err(message) => return error_payload(message),
        };

        // Duplicate gate — write actions only, normalized args so the
        // fingerprint is stable across memo/limit defaulting.
        if descriptor.write {
            if self.guard.check(name, &args) == DuplicateCheck::MustConfirm {
                info!("[engine] Duplicate {} — awaiting user confirmation", name);
                if !self.guard.confirm(name, &args).await {
                    return error_payload(format!(
                        "Cancelled by user: duplicate {} was not confirmed",
                        name
                    ));
                }
            }
        }

        match self.dispatch(name, &args).await {
            Ok(result) => {
                if descriptor.write {
                    self.guard.record(name, &args);
                }
                result.to_string()
            }
            Err(e) => error_payload(e.to_string()),
        }
    }

    /// Map a validated action call onto the Ledger.
    async fn dispatch(&self, name: &str, args: &Value) -> Result<Value, LedgerError> {
        let ledger = &self.ledger;
        match name {
            "transfer_tokens" => to_value(
                ledger
                    .transfer(str_arg(args, "to"), str_arg(args, "quantity"), str_arg(args, "memo"))
                    .await?,
            ),
            "transfer_eos_tokens" => to_value(
                ledger
                    .transfer_system_token(
                        str_arg(args, "to"),
                        str_arg(args, "quantity"),
                        str_arg(args, "memo"),
                    )
                    .await?,
            ),
            "mint_tokens" => to_value(
                ledger
                    .mint(
                        str_arg(args, "mod"),
                        str_arg(args, "quantity"),
                        str_arg(args, "payment"),
                        str_arg(args, "memo"),
                    )
                    .await?,
            ),
            "burn_tokens" => to_value(
                ledger
                    .burn(str_arg(args, "quantity"), str_arg(args, "memo"))
                    .await?,
            ),
            "view_balances" => to_value(ledger.get_balances(opt_str_arg(args, "account")).await?),
            "get_eos_balances" => {
                to_value(ledger.get_system_balances(opt_str_arg(args, "account")).await?)
            }
            "list_totems" => to_value(
                ledger
                    .list_totems(limit_arg(args), opt_str_arg(args, "cursor"))
                    .await?,
            ),
            "view_totem_stats" => {
                to_value(ledger.get_totem_stats(opt_str_arg(args, "ticker")).await?)
            }
            "list_mods" => to_value(
                ledger
                    .list_mods(limit_arg(args), opt_str_arg(args, "cursor"))
                    .await?,
            ),
            "get_fee" => Ok(ledger.get_fee().await?),
            "get_account_info" => Ok(ledger.get_account_info(str_arg(args, "account")).await?),
            "check_account_exists" => to_value(ledger.account_exists(str_arg(args, "account")).await?),
            "get_transaction" => Ok(ledger.get_transaction(str_arg(args, "tx_id")).await?),
            "get_top_holders" => to_value(
                ledger
                    .get_top_holders(str_arg(args, "ticker"), limit_arg(args))
                    .await?,
            ),
            other => Err(LedgerError::Chain(format!("Action not allowed: {}", other))),
        }
    }
}

// ── Argument validation & defaulting ───────────────────────────────────

/// Validate against the descriptor's schema and fill defaults (`memo` → "",
/// `limit` → 20). Runs BEFORE fingerprinting so that a call with an omitted
/// memo and one with an explicit empty memo are the same action.
fn normalize_arguments(descriptor: &ActionDescriptor, args: Value) -> Result<Value, String> {
    let mut map = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => return Err("Tool arguments must be a JSON object".into()),
    };

    let schema = &descriptor.input_schema;
    let properties = schema["properties"].as_object();

    if let Some(required) = schema["required"].as_array() {
        for key in required.iter().filter_map(|v| v.as_str()) {
            match map.get(key) {
                None | Some(Value::Null) => {
                    return Err(format!(
                        "Missing required argument '{}' for {}",
                        key, descriptor.name
                    ));
                }
                _ => {}
            }
        }
    }

    if let Some(properties) = properties {
        for (key, property) in properties {
            let Some(value) = map.get(key) else { continue };
            if value.is_null() {
                continue;
            }
            match property["type"].as_str() {
                Some("string") if !value.is_string() => {
                    return Err(format!(
                        "Argument '{}' for {} must be a string",
                        key, descriptor.name
                    ));
                }
                Some("number") if !value.is_number() => {
                    return Err(format!(
                        "Argument '{}' for {} must be a number",
                        key, descriptor.name
                    ));
                }
                _ => {}
            }
        }

        if properties.contains_key("memo") {
            let memo_missing = !matches!(map.get("memo"), Some(Value::String(_)));
            if memo_missing {
                map.insert("memo".into(), Value::String(String::new()));
            }
        }
        if properties.contains_key("limit") {
            let limit_missing = !map.get("limit").map(Value::is_number).unwrap_or(false);
            if limit_missing {
                map.insert("limit".into(), Value::from(DEFAULT_PAGE_LIMIT));
            }
        }
    }

    Ok(Value::Object(map))
}

// ── Payload helpers ────────────────────────────────────────────────────

fn error_payload(message: String) -> String {
    json!({ "error": message }).to_string()
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, LedgerError> {
    serde_json::to_value(value).map_err(|e| LedgerError::Chain(e.to_string()))
}

/// Required string argument — validated upstream, so absence means the
/// registry schema and the dispatch table disagree (a programming error we
/// surface as an empty string rather than a panic mid-conversation).
fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args[key].as_str().unwrap_or_default()
}

fn opt_str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args[key].as_str().filter(|s| !s.is_empty())
}

fn limit_arg(args: &Value) -> u32 {
    args["limit"]
        .as_u64()
        .or_else(|| args["limit"].as_f64().map(|f| f as u64))
        .unwrap_or(DEFAULT_PAGE_LIMIT as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{
        BalanceRow, HolderRow, ModPage, SessionInfo, TotemPage, TotemStatsRow, TxReceipt,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-process Ledger double: records every call, optionally fails writes.
    #[derive(Default)]
    struct MockLedger {
        calls: Mutex<Vec<String>>,
        fail_writes: AtomicBool,
    }

    impl MockLedger {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn log(&self, entry: String) {
            self.calls.lock().push(entry);
        }

        fn receipt(&self) -> Result<TxReceipt, LedgerError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(LedgerError::Chain("insufficient balance".into()))
            } else {
                Ok(TxReceipt {
                    transaction_id: "abc123".into(),
                })
            }
        }
    }

    #[async_trait]
    impl Ledger for MockLedger {
        fn session_info(&self) -> Option<SessionInfo> {
            Some(SessionInfo {
                account_name: "alice.totem".into(),
                chain_id: "jungle4".into(),
                chain_label: "Jungle4 Testnet".into(),
            })
        }

        async fn transfer(
            &self,
            to: &str,
            quantity: &str,
            memo: &str,
        ) -> Result<TxReceipt, LedgerError> {
            self.log(format!("transfer:{}:{}:{}", to, quantity, memo));
            self.receipt()
        }

        async fn transfer_system_token(
            &self,
            to: &str,
            quantity: &str,
            memo: &str,
        ) -> Result<TxReceipt, LedgerError> {
            self.log(format!("transfer_eos:{}:{}:{}", to, quantity, memo));
            self.receipt()
        }

        async fn mint(
            &self,
            mod_account: &str,
            quantity: &str,
            payment: &str,
            memo: &str,
        ) -> Result<TxReceipt, LedgerError> {
            self.log(format!("mint:{}:{}:{}:{}", mod_account, quantity, payment, memo));
            self.receipt()
        }

        async fn burn(&self, quantity: &str, memo: &str) -> Result<TxReceipt, LedgerError> {
            self.log(format!("burn:{}:{}", quantity, memo));
            self.receipt()
        }

        async fn get_balances(
            &self,
            account: Option<&str>,
        ) -> Result<Vec<BalanceRow>, LedgerError> {
            self.log(format!("balances:{}", account.unwrap_or("self")));
            Ok(vec![BalanceRow {
                balance: "5.0000 TEST".into(),
            }])
        }

        async fn get_system_balances(
            &self,
            account: Option<&str>,
        ) -> Result<Vec<BalanceRow>, LedgerError> {
            self.log(format!("eos_balances:{}", account.unwrap_or("self")));
            Ok(vec![])
        }

        async fn list_totems(
            &self,
            limit: u32,
            cursor: Option<&str>,
        ) -> Result<TotemPage, LedgerError> {
            self.log(format!("totems:{}:{}", limit, cursor.unwrap_or("-")));
            Ok(TotemPage {
                rows: vec![],
                more: false,
                next_key: None,
            })
        }

        async fn get_totem_stats(
            &self,
            ticker: Option<&str>,
        ) -> Result<Vec<TotemStatsRow>, LedgerError> {
            self.log(format!("stats:{}", ticker.unwrap_or("-")));
            Ok(vec![])
        }

        async fn list_mods(
            &self,
            limit: u32,
            cursor: Option<&str>,
        ) -> Result<ModPage, LedgerError> {
            self.log(format!("mods:{}:{}", limit, cursor.unwrap_or("-")));
            Ok(ModPage {
                rows: vec![],
                more: false,
                next_key: None,
            })
        }

        async fn get_fee(&self) -> Result<Value, LedgerError> {
            self.log("fee".into());
            Ok(json!({"fee": "0.5000 EOS"}))
        }

        async fn get_account_info(&self, account: &str) -> Result<Value, LedgerError> {
            self.log(format!("account_info:{}", account));
            Ok(json!({"account_name": account}))
        }

        async fn account_exists(&self, account: &str) -> Result<bool, LedgerError> {
            self.log(format!("exists:{}", account));
            Ok(account == "bob")
        }

        async fn get_transaction(&self, tx_id: &str) -> Result<Value, LedgerError> {
            self.log(format!("tx:{}", tx_id));
            Ok(json!({"id": tx_id, "status": "executed"}))
        }

        async fn get_top_holders(
            &self,
            ticker: &str,
            limit: u32,
        ) -> Result<Vec<HolderRow>, LedgerError> {
            self.log(format!("holders:{}:{}", ticker, limit));
            Ok(vec![])
        }
    }

    fn executor(ledger: Arc<MockLedger>) -> ToolExecutor {
        ToolExecutor::new(ledger, Arc::new(ConfirmationGate::new()))
    }

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).expect("payload should be JSON")
    }

    #[tokio::test]
    async fn unknown_action_never_reaches_ledger() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        let payload = exec.execute("delete_account", r#"{"account":"bob"}"#).await;
        assert_eq!(
            parse(&payload)["error"],
            "Action not allowed: delete_account"
        );
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_payloads() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        let payload = exec.execute("transfer_tokens", "not json {").await;
        assert!(parse(&payload)["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid tool arguments"));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        let payload = exec
            .execute("transfer_tokens", r#"{"to":"bob"}"#)
            .await;
        assert_eq!(
            parse(&payload)["error"],
            "Missing required argument 'quantity' for transfer_tokens"
        );
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn wrong_argument_type_is_rejected() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        let payload = exec
            .execute("transfer_tokens", r#"{"to":"bob","quantity":42}"#)
            .await;
        assert_eq!(
            parse(&payload)["error"],
            "Argument 'quantity' for transfer_tokens must be a string"
        );
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn memo_defaults_to_empty() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        let payload = exec
            .execute(
                "transfer_tokens",
                r#"{"to":"bob","quantity":"1.0000 TEST"}"#,
            )
            .await;
        assert_eq!(parse(&payload)["transactionId"], "abc123");
        assert_eq!(ledger.calls(), vec!["transfer:bob:1.0000 TEST:"]);
    }

    #[tokio::test]
    async fn limit_defaults_to_twenty() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        exec.execute("list_totems", "{}").await;
        exec.execute("get_top_holders", r#"{"ticker":"TEST"}"#).await;
        assert_eq!(ledger.calls(), vec!["totems:20:-", "holders:TEST:20"]);
    }

    #[tokio::test]
    async fn second_identical_write_is_cancelled_when_headless() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());
        let args = r#"{"to":"bob","quantity":"1.0000 TEST"}"#;

        let first = exec.execute("transfer_tokens", args).await;
        assert_eq!(parse(&first)["transactionId"], "abc123");

        // No surface attached → confirmation fails closed, ledger untouched.
        let second = exec.execute("transfer_tokens", args).await;
        assert_eq!(
            parse(&second)["error"],
            "Cancelled by user: duplicate transfer_tokens was not confirmed"
        );
        assert_eq!(ledger.calls().len(), 1);
    }

    #[tokio::test]
    async fn confirmed_duplicate_executes_again() {
        let ledger = Arc::new(MockLedger::default());
        let gate = Arc::new(ConfirmationGate::new());
        let mut rx = gate.attach();
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                request.approve();
            }
        });

        let exec = ToolExecutor::new(ledger.clone(), gate);
        let args = r#"{"to":"bob","quantity":"1.0000 TEST"}"#;

        exec.execute("transfer_tokens", args).await;
        let second = exec.execute("transfer_tokens", args).await;
        assert_eq!(parse(&second)["transactionId"], "abc123");
        assert_eq!(ledger.calls().len(), 2);
    }

    #[tokio::test]
    async fn explicit_empty_memo_matches_defaulted_memo() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        exec.execute(
            "transfer_tokens",
            r#"{"to":"bob","quantity":"1.0000 TEST"}"#,
        )
        .await;
        // Same action with memo spelled out — must hit the duplicate gate.
        let second = exec
            .execute(
                "transfer_tokens",
                r#"{"to":"bob","quantity":"1.0000 TEST","memo":""}"#,
            )
            .await;
        assert!(parse(&second)["error"]
            .as_str()
            .unwrap()
            .starts_with("Cancelled by user"));
    }

    #[tokio::test]
    async fn failed_write_is_not_recorded_as_fingerprint() {
        let ledger = Arc::new(MockLedger::default());
        ledger.fail_writes.store(true, Ordering::SeqCst);
        let exec = executor(ledger.clone());
        let args = r#"{"quantity":"1.0000 TEST"}"#;

        let failed = exec.execute("burn_tokens", args).await;
        assert_eq!(parse(&failed)["error"], "insufficient balance");

        // The chain recovers; the retry must NOT require confirmation.
        ledger.fail_writes.store(false, Ordering::SeqCst);
        let retry = exec.execute("burn_tokens", args).await;
        assert_eq!(parse(&retry)["transactionId"], "abc123");
        assert_eq!(ledger.calls().len(), 2);
    }

    #[tokio::test]
    async fn read_actions_repeat_without_confirmation() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        for _ in 0..3 {
            let payload = exec.execute("view_balances", "{}").await;
            assert!(payload.contains("5.0000 TEST"));
        }
        assert_eq!(ledger.calls().len(), 3);
    }

    #[tokio::test]
    async fn ledger_failures_are_serialized_not_thrown() {
        let ledger = Arc::new(MockLedger::default());
        ledger.fail_writes.store(true, Ordering::SeqCst);
        let exec = executor(ledger);

        let payload = exec
            .execute(
                "mint_tokens",
                r#"{"mod":"minter.mod","quantity":"100.0000 TEST","payment":"1.0000 EOS"}"#,
            )
            .await;
        assert_eq!(parse(&payload)["error"], "insufficient balance");
    }

    #[tokio::test]
    async fn empty_argument_string_means_no_arguments() {
        let ledger = Arc::new(MockLedger::default());
        let exec = executor(ledger.clone());

        let payload = exec.execute("get_fee", "").await;
        assert_eq!(parse(&payload)["fee"], "0.5000 EOS");
        assert_eq!(ledger.calls(), vec!["fee"]);
    }
}

// Totems Agent Engine — Action Registry
// The fixed catalog of actions the model may request. Defined once at
// process start, never mutated at runtime. Any name absent from this
// registry is rejected by the tool executor before it can reach the Ledger.

use std::sync::LazyLock;

use serde_json::{json, Value};

use crate::atoms::constants::WRITE_ACTIONS;

/// One callable action: name, human description, and a JSON Schema for its
/// arguments. `write` marks actions that mutate chain state and therefore
/// pass through the duplicate guard.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub write: bool,
}

static REGISTRY: LazyLock<Vec<ActionDescriptor>> = LazyLock::new(build_registry);

/// All registered actions, in stable catalog order.
pub fn all() -> &'static [ActionDescriptor] {
    &REGISTRY
}

/// Look up a single action by name.
pub fn get(name: &str) -> Option<&'static ActionDescriptor> {
    REGISTRY.iter().find(|a| a.name == name)
}

/// Whether `name` is on the write-action whitelist.
pub fn is_write_action(name: &str) -> bool {
    WRITE_ACTIONS.contains(&name)
}

fn build_registry() -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor {
            name: "transfer_tokens",
            description: "Transfer totem tokens to another account",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string", "description": "Recipient account name (1-12 chars, a-z, 1-5, .)" },
                    "quantity": { "type": "string", "description": "Amount with precision and symbol, e.g. \"10.0000 TEST\"" },
                    "memo": { "type": "string", "description": "Optional memo for the transfer" },
                },
                "required": ["to", "quantity"],
            }),
            write: true,
        },
        ActionDescriptor {
            name: "transfer_eos_tokens",
            description: "Transfer EOS/system tokens (eosio.token) to another account",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string", "description": "Recipient account name (1-12 chars, a-z, 1-5, .)" },
                    "quantity": { "type": "string", "description": "Amount with precision and symbol, e.g. \"1.0000 EOS\"" },
                    "memo": { "type": "string", "description": "Optional memo for the transfer" },
                },
                "required": ["to", "quantity"],
            }),
            write: true,
        },
        ActionDescriptor {
            name: "mint_tokens",
            description: "Mint totem tokens using a minter mod",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "mod": { "type": "string", "description": "Minter mod contract account name" },
                    "quantity": { "type": "string", "description": "Amount to mint, e.g. \"100.0000 TEST\"" },
                    "payment": { "type": "string", "description": "Payment amount, e.g. \"1.0000 EOS\"" },
                    "memo": { "type": "string", "description": "Optional memo" },
                },
                "required": ["mod", "quantity", "payment"],
            }),
            write: true,
        },
        ActionDescriptor {
            name: "burn_tokens",
            description: "Burn totem tokens",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "quantity": { "type": "string", "description": "Amount to burn, e.g. \"10.0000 TEST\"" },
                    "memo": { "type": "string", "description": "Optional memo" },
                },
                "required": ["quantity"],
            }),
            write: true,
        },
        ActionDescriptor {
            name: "view_balances",
            description: "View token balances for the logged-in account or a specified account",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "account": { "type": "string", "description": "Account to check (defaults to logged-in account)" },
                },
                "required": [],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "get_eos_balances",
            description: "View EOS/system token balances (eosio.token) for the logged-in account or a specified account",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "account": { "type": "string", "description": "Account to check (defaults to logged-in account)" },
                },
                "required": [],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "list_totems",
            description: "List available totems with pagination",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "number", "description": "Number of results per page (default 20)" },
                    "cursor": { "type": "string", "description": "Pagination cursor from previous request" },
                },
                "required": [],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "view_totem_stats",
            description: "View statistics for totems (mints, burns, transfers, holders)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ticker": { "type": "string", "description": "Optional specific ticker to filter" },
                },
                "required": [],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "list_mods",
            description: "List available mods from the marketplace",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "number", "description": "Number of results per page (default 20)" },
                    "cursor": { "type": "string", "description": "Pagination cursor from previous request" },
                },
                "required": [],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "get_fee",
            description: "Get the current totem fee configuration",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "get_account_info",
            description: "Get account information including RAM, CPU, and NET resource usage",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "account": { "type": "string", "description": "Account name to look up" },
                },
                "required": ["account"],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "check_account_exists",
            description: "Check if a blockchain account exists",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "account": { "type": "string", "description": "Account name to check" },
                },
                "required": ["account"],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "get_transaction",
            description: "Look up a transaction by its ID to see block number, time, status, and actions",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tx_id": { "type": "string", "description": "Transaction ID hash" },
                },
                "required": ["tx_id"],
            }),
            write: false,
        },
        ActionDescriptor {
            name: "get_top_holders",
            description: "Get the top token holders for a specific totem token sorted by balance",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ticker": { "type": "string", "description": "Token symbol, e.g. \"TEST\"" },
                    "limit": { "type": "number", "description": "Number of top holders to return (default 20)" },
                },
                "required": ["ticker"],
            }),
            write: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_full_catalog() {
        assert_eq!(all().len(), 14);
        let writes: Vec<_> = all().iter().filter(|a| a.write).collect();
        assert_eq!(writes.len(), 4);
    }

    #[test]
    fn every_write_descriptor_is_whitelisted() {
        for action in all().iter().filter(|a| a.write) {
            assert!(
                is_write_action(action.name),
                "write action '{}' missing from whitelist",
                action.name
            );
        }
        // And the inverse: the whitelist names only registered write actions.
        for name in WRITE_ACTIONS {
            let desc = get(name).expect("whitelisted action must be registered");
            assert!(desc.write);
        }
    }

    #[test]
    fn lookup_by_name() {
        assert!(get("transfer_tokens").is_some());
        assert!(get("view_balances").is_some());
        assert!(get("delete_account").is_none());
    }

    #[test]
    fn read_actions_are_not_write() {
        assert!(!is_write_action("view_balances"));
        assert!(!is_write_action("get_top_holders"));
        assert!(is_write_action("burn_tokens"));
    }

    #[test]
    fn schemas_declare_required_fields() {
        let transfer = get("transfer_tokens").unwrap();
        let required = transfer.input_schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "to"));
        assert!(required.iter().any(|v| v == "quantity"));
        // memo is optional
        assert!(!required.iter().any(|v| v == "memo"));
    }
}

// Totems Agent Engine — Agentic Loop
// The core orchestration loop: send to model → tool calls → execute →
// feed results back → repeat until the model produces plain text.
//
// Tool calls within one model turn run strictly in request order, one at a
// time — later calls may depend on state mutated by earlier ones (balances,
// duplicate fingerprints), and only one confirmation may be outstanding.

use log::{info, warn};
use serde_json::Value;

use crate::atoms::error::EngineResult;
use crate::engine::providers::AnyProvider;
use crate::engine::tool_executor::ToolExecutor;
use crate::engine::types::{ChatTurn, ModelReply, ToolCallRecord, ToolOutcome};

/// Run a complete agent turn against an already-prepared wire history and
/// return the model's final text.
///
/// Tool failures are serialized into the conversation and never abort the
/// loop; provider failures (auth, network, API) do.
pub(crate) async fn run_agent_turn(
    provider: &AnyProvider,
    model: &str,
    system_prompt: &str,
    wire_history: &mut Vec<Value>,
    transcript: &mut Vec<ChatTurn>,
    executor: &ToolExecutor,
    tools: &Value,
    max_rounds: u32,
) -> EngineResult<String> {
    let mut round = 0;

    loop {
        round += 1;
        if round > max_rounds {
            warn!("[engine] Max tool rounds ({}) reached, stopping", max_rounds);
            return Ok(String::new());
        }

        info!("[engine] Agent round {}/{}", round, max_rounds);

        let reply = provider
            .complete(model, system_prompt, wire_history, tools)
            .await?;

        match reply {
            ModelReply::Text { ref content, .. } => {
                provider.append_assistant(wire_history, &reply);
                return Ok(content.clone());
            }
            ModelReply::ToolCalls {
                ref calls,
                ref assistant_turn,
            } => {
                info!("[engine] Round {}: {} tool calls", round, calls.len());

                let mut outcomes: Vec<ToolOutcome> = Vec::with_capacity(calls.len());
                for call in calls {
                    let payload = executor.execute(&call.name, &call.arguments).await;

                    // Transcript gets the literal arguments and the parsed
                    // result payload, one turn per executed call.
                    let input: Value =
                        serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
                    let result: Value = serde_json::from_str(&payload)
                        .unwrap_or_else(|_| Value::String(payload.clone()));
                    transcript.push(ChatTurn::tool_call(ToolCallRecord {
                        name: call.name.clone(),
                        input,
                        result,
                    }));

                    outcomes.push(ToolOutcome {
                        call_id: call.id.clone(),
                        payload,
                    });
                }

                provider.append_tool_results(wire_history, assistant_turn, &outcomes);
                // Loop: the model sees the results and either answers or
                // asks for more tools.
            }
        }
    }
}

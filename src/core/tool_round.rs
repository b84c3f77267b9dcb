use crate::llm::{
    Completion, CompletionRequest, LlmError, Part, Provider, StopReason, ToolSpec, ToolUse, Turn,
    Usage,
};
use crate::storage::Role;
use crate::tools::ToolExecutor;

/// Final result of a request that may have included one tool call.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub completion: Completion,
    /// Usage summed over every provider call made.
    pub usage: Option<Usage>,
    /// Number of provider calls made (1 or 2).
    pub calls: usize,
}

enum RoundState {
    AwaitingReply,
    ToolRequested {
        reply: Completion,
        tool_use: ToolUse,
    },
    ToolExecuted {
        assistant: Turn,
        result: Turn,
        usage: Option<Usage>,
    },
    FinalReply {
        completion: Completion,
        usage: Option<Usage>,
        calls: usize,
    },
}

fn sum_usage(a: Option<Usage>, b: Option<Usage>) -> Option<Usage> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Run a completion with at most one tool round trip.
///
/// When the first reply stops for tool use, the first requested tool is
/// executed and exactly one follow-up call is made with its result. A second
/// tool request in the follow-up is not executed.
pub async fn run(
    provider: &dyn Provider,
    executor: &dyn ToolExecutor,
    model: &str,
    turns: &[Turn],
    tools: &[ToolSpec],
) -> Result<RoundOutcome, LlmError> {
    let mut state = RoundState::AwaitingReply;

    loop {
        state = match state {
            RoundState::AwaitingReply => {
                let reply = provider
                    .complete(CompletionRequest {
                        model,
                        turns,
                        tools,
                    })
                    .await?;

                let tool_use = match reply.stop_reason {
                    StopReason::ToolUse => reply.message.first_tool_use().cloned(),
                    _ => None,
                };

                match tool_use {
                    Some(tool_use) => RoundState::ToolRequested { reply, tool_use },
                    None => RoundState::FinalReply {
                        usage: reply.usage,
                        completion: reply,
                        calls: 1,
                    },
                }
            }
            RoundState::ToolRequested { reply, tool_use } => {
                tracing::info!(
                    "{} requested tool '{}' (id {})",
                    provider.name(),
                    tool_use.name,
                    tool_use.id
                );

                let content = executor.execute(&tool_use.name, &tool_use.input).await;
                let result = Turn::new(
                    Role::User,
                    vec![Part::ToolResult {
                        tool_use_id: tool_use.id,
                        content,
                    }],
                );

                RoundState::ToolExecuted {
                    assistant: reply.message,
                    result,
                    usage: reply.usage,
                }
            }
            RoundState::ToolExecuted {
                assistant,
                result,
                usage,
            } => {
                let mut follow_up = turns.to_vec();
                follow_up.push(assistant);
                follow_up.push(result);

                let completion = provider
                    .complete(CompletionRequest {
                        model,
                        turns: &follow_up,
                        tools,
                    })
                    .await?;

                if completion.stop_reason == StopReason::ToolUse {
                    tracing::warn!("Follow-up reply asked for another tool; not executing it");
                }

                RoundState::FinalReply {
                    usage: sum_usage(usage, completion.usage),
                    completion,
                    calls: 2,
                }
            }
            RoundState::FinalReply {
                completion,
                usage,
                calls,
            } => {
                return Ok(RoundOutcome {
                    completion,
                    usage,
                    calls,
                })
            }
        };
    }
}

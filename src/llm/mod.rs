pub mod anthropic;
mod error;
pub mod openrouter;
pub mod pricing;
pub mod routing;

pub use anthropic::AnthropicClient;
pub use error::LlmError;
pub use openrouter::OpenRouterClient;
pub use routing::{ModelRouter, ProviderKind};

use crate::storage::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Image payload attached to a turn, already split out of its data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub media_type: String,
    /// Base64 without the `data:` prefix.
    pub data: String,
}

impl ImageData {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Image(ImageData),
    ToolUse(ToolUse),
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// One role-tagged entry of the sequence sent to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::Text(text.into())])
    }

    /// Concatenated text of all text parts.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn first_tool_use(&self) -> Option<&ToolUse> {
        self.parts.iter().find_map(|part| match part {
            Part::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }
}

/// Tool offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

impl std::ops::Add for Usage {
    type Output = Usage;

    fn add(self, other: Usage) -> Usage {
        Usage::new(
            self.input_tokens.saturating_add(other.input_tokens),
            self.output_tokens.saturating_add(other.output_tokens),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Other(String),
}

impl StopReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "end_turn" | "stop" | "stop_sequence" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            "tool_use" | "tool_calls" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Usage figures reported for one generation. `None` means unknown, not zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub tokens_prompt: Option<i64>,
    pub tokens_completion: Option<i64>,
    pub total_cost: Option<f64>,
}

impl GenerationStats {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn from_usage(usage: Usage, total_cost: f64) -> Self {
        Self {
            tokens_prompt: Some(usage.input_tokens as i64),
            tokens_completion: Some(usage.output_tokens as i64),
            total_cost: Some(total_cost),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub turns: &'a [Turn],
    pub tools: &'a [ToolSpec],
}

/// A provider reply in provider-neutral form.
#[derive(Debug, Clone)]
pub struct Completion {
    pub generation_id: String,
    pub message: Turn,
    pub stop_reason: StopReason,
    /// Present when the provider reports usage inline.
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError>;

    /// Usage lookup for providers that report it out of band.
    async fn generation_stats(&self, generation_id: &str) -> Result<GenerationStats, LlmError> {
        let _ = generation_id;
        Err(LlmError::Unsupported(format!(
            "{} reports usage inline",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stop_reason_parse() {
        assert_eq!(StopReason::parse("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::parse("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::parse("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::parse("length"), StopReason::MaxTokens);
        assert_eq!(
            StopReason::parse("refusal"),
            StopReason::Other("refusal".to_string())
        );
    }

    #[test]
    fn test_turn_helpers() {
        let turn = Turn::new(
            Role::Assistant,
            vec![
                Part::Text("Let me check. ".to_string()),
                Part::ToolUse(ToolUse {
                    id: "toolu_1".to_string(),
                    name: "get_stock_price".to_string(),
                    input: json!({"ticker": "AAPL"}),
                }),
                Part::Text("Done.".to_string()),
            ],
        );

        assert_eq!(turn.joined_text(), "Let me check. Done.");
        assert_eq!(turn.first_tool_use().unwrap().name, "get_stock_price");
        assert!(Turn::text(Role::User, "hi").first_tool_use().is_none());
    }

    #[test]
    fn test_usage_add_and_stats() {
        let total = Usage::new(10, 5) + Usage::new(20, 7);
        assert_eq!(total, Usage::new(30, 12));

        let stats = GenerationStats::from_usage(total, 0.5);
        assert_eq!(stats.tokens_prompt, Some(30));
        assert_eq!(stats.tokens_completion, Some(12));
        assert_eq!(stats.total_cost, Some(0.5));
        assert_eq!(GenerationStats::absent().total_cost, None);
    }

    #[test]
    fn test_data_uri() {
        let image = ImageData {
            media_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        assert_eq!(image.to_data_uri(), "data:image/png;base64,aGVsbG8=");
    }
}

use crate::llm::GenerationStats;
use crate::storage::Message;
use serde::{Deserialize, Serialize};

/// Chat request
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<i64>,
}

/// Chat response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: i64,
    pub generation_stats: GenerationStats,
}

/// One stored message as shown in the chat history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    pub tokens_prompt: Option<i64>,
    pub tokens_completion: Option<i64>,
    pub total_cost: Option<f64>,
    pub image_data: Option<String>,
}

impl From<Message> for HistoryEntry {
    fn from(message: Message) -> Self {
        Self {
            role: message.role.to_string(),
            content: message.content,
            tokens_prompt: message.tokens_prompt,
            tokens_completion: message.tokens_completion,
            total_cost: message.total_cost,
            image_data: message.image_data,
        }
    }
}

/// Append-to-history request
#[derive(Debug, Deserialize)]
pub struct AppendBody {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub image_data: Option<String>,
}

/// History reset request
#[derive(Debug, Default, Deserialize)]
pub struct ResetBody {
    #[serde(default)]
    pub conversation_id: Option<i64>,
}

/// Create conversation request
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationBody {
    #[serde(default)]
    pub name: Option<String>,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Role;
    use chrono::Utc;

    #[test]
    fn test_history_entry_keeps_nulls() {
        let entry = HistoryEntry::from(Message {
            id: 1,
            conversation_id: 1,
            role: Role::User,
            content: "hi".to_string(),
            timestamp: Utc::now(),
            image_data: None,
            generation_id: None,
            tokens_prompt: None,
            tokens_completion: None,
            total_cost: None,
        });

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["role"], "user");
        assert!(value["tokens_prompt"].is_null());
        assert!(value["image_data"].is_null());
    }

    #[test]
    fn test_status_response() {
        let value = serde_json::to_value(StatusResponse::success()).unwrap();
        assert_eq!(value, serde_json::json!({"status": "success"}));

        let value = serde_json::to_value(StatusResponse::with_message("done")).unwrap();
        assert_eq!(value["message"], "done");
    }
}

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => anyhow::bail!("Unknown message role: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub image_data: Option<String>,
    pub generation_id: Option<String>,
    pub tokens_prompt: Option<i64>,
    pub tokens_completion: Option<i64>,
    pub total_cost: Option<f64>,
}

/// A message that has not been written yet. The store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub image_data: Option<String>,
    pub generation_id: Option<String>,
    pub tokens_prompt: Option<i64>,
    pub tokens_completion: Option<i64>,
    pub total_cost: Option<f64>,
}

impl NewMessage {
    /// Plain message with no usage metadata, stamped now.
    pub fn new(conversation_id: i64, role: Role, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            image_data: None,
            generation_id: None,
            tokens_prompt: None,
            tokens_completion: None,
            total_cost: None,
        }
    }

    pub fn with_image(mut self, image_data: Option<String>) -> Self {
        self.image_data = image_data;
        self
    }
}

#[async_trait]
pub trait Storage: Send + Sync + Clone {
    // Conversations
    async fn create_conversation(&self, name: &str) -> Result<Conversation>;
    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>>;
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;
    /// Deletes the conversation and its messages. Returns false if it did not exist.
    async fn delete_conversation(&self, id: i64) -> Result<bool>;

    // Messages
    async fn add_message(&self, message: NewMessage) -> Result<Message>;
    /// Messages of one conversation, oldest first.
    async fn get_messages(&self, conversation_id: i64) -> Result<Vec<Message>>;
    /// Messages of every conversation, oldest first.
    async fn get_all_messages(&self) -> Result<Vec<Message>>;
    async fn delete_conversation_messages(&self, conversation_id: i64) -> Result<u64>;
    async fn delete_all_messages(&self) -> Result<u64>;

    /// Removes every conversation and message.
    async fn clear(&self) -> Result<()>;
}

use super::dispatcher::Dispatcher;
use super::formatter::{format_history, parse_image, PendingInput};
use super::ChatError;
use crate::llm::GenerationStats;
use crate::storage::{Conversation, Message, NewMessage, Role, Storage};

const DEFAULT_CONVERSATION_NAME: &str = "New Conversation";
const MAX_NAME_CHARS: usize = 50;

/// An incoming chat message.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub model: Option<String>,
    pub image_data: Option<String>,
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub message: String,
    pub conversation_id: i64,
    pub generation_stats: GenerationStats,
}

/// A message written straight into history without calling a provider.
#[derive(Debug, Clone)]
pub struct HistoryAppend {
    pub role: String,
    pub content: String,
    pub conversation_id: Option<i64>,
    pub image_data: Option<String>,
}

/// Conversation orchestration shared by the HTTP routes and the CLI.
pub struct ChatService<S: Storage> {
    storage: S,
    dispatcher: Dispatcher,
}

/// Name a new conversation after the start of its first message.
fn conversation_name(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return DEFAULT_CONVERSATION_NAME.to_string();
    }
    let mut name: String = first_line.chars().take(MAX_NAME_CHARS).collect();
    if first_line.chars().count() > MAX_NAME_CHARS {
        name.push_str("...");
    }
    name
}

impl<S: Storage> ChatService<S> {
    pub fn new(storage: S, dispatcher: Dispatcher) -> Self {
        Self {
            storage,
            dispatcher,
        }
    }

    /// Send a user message and store the exchange.
    ///
    /// Nothing is written until the request has been validated. If the
    /// provider call fails the user message stays without a reply.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome, ChatError> {
        let text = request.message.unwrap_or_default();
        let raw_image = request.image_data.filter(|raw| !raw.trim().is_empty());
        if text.trim().is_empty() && raw_image.is_none() {
            return Err(ChatError::MissingInput);
        }

        let model = request
            .model
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| self.dispatcher.default_model().to_string());
        if !self.dispatcher.is_allowed(&model) {
            return Err(ChatError::ModelNotAllowed(model));
        }

        let image = raw_image.as_deref().map(parse_image).transpose()?;

        let conversation = match request.conversation_id {
            Some(id) => self.require_conversation(id).await?,
            None => {
                let conversation = self
                    .storage
                    .create_conversation(&conversation_name(&text))
                    .await?;
                tracing::info!("Created conversation {}", conversation.id);
                conversation
            }
        };

        let history = self.storage.get_messages(conversation.id).await?;

        self.storage
            .add_message(
                NewMessage::new(conversation.id, Role::User, text.clone())
                    .with_image(image.as_ref().map(|image| image.to_data_uri())),
            )
            .await?;

        let turns = format_history(&history, &PendingInput { text, image });

        tracing::info!(
            "Chat in conversation {}: model={}, {} stored messages, {} turns",
            conversation.id,
            model,
            history.len(),
            turns.len()
        );

        let reply = self.dispatcher.dispatch(&model, &turns).await?;

        let mut assistant = NewMessage::new(conversation.id, Role::Assistant, reply.text.clone());
        assistant.generation_id = Some(reply.generation_id);
        assistant.tokens_prompt = reply.stats.tokens_prompt;
        assistant.tokens_completion = reply.stats.tokens_completion;
        assistant.total_cost = reply.stats.total_cost;
        self.storage.add_message(assistant).await?;

        Ok(ChatOutcome {
            message: reply.text,
            conversation_id: conversation.id,
            generation_stats: reply.stats,
        })
    }

    /// Messages of one conversation, or of all conversations when `None`.
    pub async fn history(&self, conversation_id: Option<i64>) -> Result<Vec<Message>, ChatError> {
        match conversation_id {
            Some(id) => {
                self.require_conversation(id).await?;
                Ok(self.storage.get_messages(id).await?)
            }
            None => Ok(self.storage.get_all_messages().await?),
        }
    }

    /// Append a message without calling a provider. A missing conversation
    /// id starts a new conversation.
    pub async fn append(&self, append: HistoryAppend) -> Result<Message, ChatError> {
        let role: Role = append
            .role
            .parse()
            .map_err(|_| ChatError::InvalidRole(append.role.clone()))?;

        let image = append
            .image_data
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(parse_image)
            .transpose()?;

        let conversation = match append.conversation_id {
            Some(id) => self.require_conversation(id).await?,
            None => {
                self.storage
                    .create_conversation(&conversation_name(&append.content))
                    .await?
            }
        };

        let message = self
            .storage
            .add_message(
                NewMessage::new(conversation.id, role, append.content)
                    .with_image(image.map(|image| image.to_data_uri())),
            )
            .await?;
        Ok(message)
    }

    /// Delete the messages of one conversation, or every message when `None`.
    /// Conversations themselves are kept.
    pub async fn reset(&self, conversation_id: Option<i64>) -> Result<u64, ChatError> {
        let deleted = match conversation_id {
            Some(id) => {
                self.require_conversation(id).await?;
                self.storage.delete_conversation_messages(id).await?
            }
            None => self.storage.delete_all_messages().await?,
        };
        tracing::info!(
            "Reset chat history ({:?}): {} messages deleted",
            conversation_id,
            deleted
        );
        Ok(deleted)
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.storage.list_conversations().await?)
    }

    pub async fn create_conversation(&self, name: Option<&str>) -> Result<Conversation, ChatError> {
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CONVERSATION_NAME);
        Ok(self.storage.create_conversation(name).await?)
    }

    pub async fn delete_conversation(&self, id: i64) -> Result<(), ChatError> {
        if self.storage.delete_conversation(id).await? {
            tracing::info!("Deleted conversation {}", id);
            Ok(())
        } else {
            Err(ChatError::ConversationNotFound(id))
        }
    }

    async fn require_conversation(&self, id: i64) -> Result<Conversation, ChatError> {
        self.storage
            .get_conversation(id)
            .await?
            .ok_or(ChatError::ConversationNotFound(id))
    }
}

use super::formatter::ImageError;
use crate::llm::LlmError;
use thiserror::Error;

/// Failures of a chat request, grouped by how the caller should react.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Either a message or an image is required")]
    MissingInput,

    #[error("Model '{0}' is not allowed")]
    ModelNotAllowed(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(#[from] ImageError),

    #[error("Unknown message role '{0}'")]
    InvalidRole(String),

    #[error("Conversation {0} not found")]
    ConversationNotFound(i64),

    #[error("{0}")]
    Provider(#[from] LlmError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ChatError {
    /// True when the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChatError::MissingInput
                | ChatError::ModelNotAllowed(_)
                | ChatError::InvalidImage(_)
                | ChatError::InvalidRole(_)
        )
    }
}

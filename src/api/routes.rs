use crate::analysis::{PriceAnalyzer, PriceChangeAnalysis};
use crate::api::{
    AppendBody, ApiError, ChatBody, ChatResponse, CreateConversationBody, HistoryEntry, ResetBody,
    StatusResponse,
};
use crate::core::{ChatRequest, ChatService, HistoryAppend};
use crate::storage::{Conversation, Storage};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;

/// Shared state behind every route
pub struct AppState<S: Storage> {
    pub chat: ChatService<S>,
    pub analyzer: PriceAnalyzer,
}

/// Parse a JSON body that may be omitted entirely.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

/// POST /api/chat - Send a message and get the model's reply
pub async fn chat<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = body?;
    let start = Instant::now();

    let outcome = state
        .chat
        .chat(ChatRequest {
            message: body.message,
            model: body.model,
            image_data: body.image_data,
            conversation_id: body.conversation_id,
        })
        .await?;

    tracing::info!(
        "Chat completed in conversation {} ({}ms)",
        outcome.conversation_id,
        start.elapsed().as_millis()
    );

    Ok(Json(ChatResponse {
        message: outcome.message,
        conversation_id: outcome.conversation_id,
        generation_stats: outcome.generation_stats,
    }))
}

/// GET /api/chat_history - Messages of every conversation
pub async fn all_history<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let messages = state.chat.history(None).await?;
    Ok(Json(messages.into_iter().map(HistoryEntry::from).collect()))
}

/// GET /api/chat_history/:conversation_id
pub async fn conversation_history<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let messages = state.chat.history(Some(conversation_id)).await?;
    Ok(Json(messages.into_iter().map(HistoryEntry::from).collect()))
}

/// POST /api/chat_history - Store a message without calling a model
pub async fn append_history<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<AppendBody>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(body) = body?;

    state
        .chat
        .append(HistoryAppend {
            role: body.role,
            content: body.content,
            conversation_id: body.conversation_id,
            image_data: body.image_data,
        })
        .await?;

    Ok(Json(StatusResponse::success()))
}

/// POST /api/chat_history/reset - Body is optional; without a conversation
/// id every message is deleted
pub async fn reset_history<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let body: ResetBody = optional_json(&body)?;
    state.chat.reset(body.conversation_id).await?;

    Ok(Json(StatusResponse::with_message(
        "Chat history reset successfully",
    )))
}

/// GET /api/conversations
pub async fn list_conversations<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    Ok(Json(state.chat.conversations().await?))
}

/// POST /api/conversations
pub async fn create_conversation<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let body: CreateConversationBody = optional_json(&body)?;
    let conversation = state
        .chat
        .create_conversation(body.name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// DELETE /api/conversations/:id
pub async fn delete_conversation<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.chat.delete_conversation(id).await?;
    Ok(Json(StatusResponse::success()))
}

/// GET /api/silver_analysis
pub async fn silver_analysis<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<PriceChangeAnalysis>, ApiError> {
    Ok(Json(state.analyzer.analyze().await?))
}

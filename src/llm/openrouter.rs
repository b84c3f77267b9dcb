use super::{
    Completion, CompletionRequest, GenerationStats, LlmError, Part, Provider, StopReason, Turn,
};
use crate::config::OpenRouterConfig;
use crate::storage::Role;
use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPart, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
    Client as OpenAIClient,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

/// Client for the OpenRouter chat completions API (OpenAI-compatible).
///
/// OpenRouter does not return cost with the completion; usage is fetched
/// afterwards from its generation-stats endpoint.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: OpenAIClient<OpenAIConfig>,
    http: reqwest::Client,
    config: OpenRouterConfig,
}

#[derive(Debug, Deserialize)]
struct GenerationEnvelope {
    data: GenerationData,
}

#[derive(Debug, Deserialize)]
struct GenerationData {
    #[serde(default)]
    tokens_prompt: Option<i64>,
    #[serde(default)]
    tokens_completion: Option<i64>,
    #[serde(default)]
    total_cost: Option<f64>,
}

impl OpenRouterClient {
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        // App attribution headers go on every request, completions and stats alike
        let mut headers = HeaderMap::new();
        headers.insert(
            "HTTP-Referer",
            HeaderValue::from_str(&config.referer).context("Invalid OpenRouter referer")?,
        );
        headers.insert(
            "X-Title",
            HeaderValue::from_str(&config.title).context("Invalid OpenRouter title")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        let openai_config = OpenAIConfig::new()
            .with_api_base(&config.base_url)
            .with_api_key(config.api_key.clone().unwrap_or_default());

        let client = OpenAIClient::with_config(openai_config).with_http_client(http.clone());

        Ok(Self {
            client,
            http,
            config: config.clone(),
        })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::InvalidRequest("OpenRouter API key is not set".into()))
    }

    fn convert_turn(turn: &Turn) -> Result<ChatCompletionRequestMessage, LlmError> {
        match turn.role {
            Role::User => {
                let content = match turn.parts.as_slice() {
                    [Part::Text(text)] => ChatCompletionRequestUserMessageContent::Text(text.clone()),
                    parts => {
                        let converted = parts
                            .iter()
                            .map(Self::convert_user_part)
                            .collect::<Result<Vec<_>, _>>()?;
                        ChatCompletionRequestUserMessageContent::Array(converted)
                    }
                };
                Ok(ChatCompletionRequestUserMessageArgs::default()
                    .content(content)
                    .build()
                    .map_err(invalid_request)?
                    .into())
            }
            Role::Assistant => {
                if turn.first_tool_use().is_some() {
                    return Err(LlmError::InvalidRequest(
                        "tool calls are not supported for OpenRouter models".into(),
                    ));
                }
                Ok(ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.joined_text())
                    .build()
                    .map_err(invalid_request)?
                    .into())
            }
        }
    }

    fn convert_user_part(
        part: &Part,
    ) -> Result<ChatCompletionRequestMessageContentPart, LlmError> {
        match part {
            Part::Text(text) => Ok(ChatCompletionRequestMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartTextArgs::default()
                    .text(text.clone())
                    .build()
                    .map_err(invalid_request)?,
            )),
            Part::Image(image) => {
                let image_url = ImageUrlArgs::default()
                    .url(image.to_data_uri())
                    .build()
                    .map_err(invalid_request)?;
                Ok(ChatCompletionRequestMessageContentPart::Image(
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(image_url)
                        .build()
                        .map_err(invalid_request)?,
                ))
            }
            Part::ToolUse(_) | Part::ToolResult { .. } => Err(LlmError::InvalidRequest(
                "tool results are not supported for OpenRouter models".into(),
            )),
        }
    }
}

fn invalid_request(err: OpenAIError) -> LlmError {
    LlmError::InvalidRequest(err.to_string())
}

#[async_trait::async_trait]
impl Provider for OpenRouterClient {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion, LlmError> {
        self.api_key()?;

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        if !self.config.system_prompt.is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(self.config.system_prompt.clone())
                    .build()
                    .map_err(invalid_request)?
                    .into(),
            );
        }
        for turn in request.turns {
            messages.push(Self::convert_turn(turn)?);
        }

        let req = CreateChatCompletionRequestArgs::default()
            .model(request.model)
            .messages(messages)
            .max_tokens(u16::try_from(self.config.max_tokens).unwrap_or(u16::MAX))
            .build()
            .map_err(invalid_request)?;

        tracing::debug!(
            "OpenRouter request: model={}, turns={}",
            request.model,
            request.turns.len()
        );

        let response = self.client.chat().create(req).await.map_err(|e| match e {
            OpenAIError::Reqwest(err) => LlmError::Network(err.to_string()),
            other => LlmError::Api(other.to_string()),
        })?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in chat completion".into()))?;

        let content = choice.message.content.clone().unwrap_or_default();
        let stop_reason = choice
            .finish_reason
            .as_ref()
            .and_then(|r| serde_json::to_value(r).ok())
            .and_then(|v| v.as_str().map(StopReason::parse))
            .unwrap_or(StopReason::EndTurn);

        Ok(Completion {
            generation_id: response.id,
            message: Turn::text(Role::Assistant, content),
            stop_reason,
            usage: None,
        })
    }

    async fn generation_stats(&self, generation_id: &str) -> Result<GenerationStats, LlmError> {
        let api_key = self.api_key()?;
        let url = format!("{}/generation", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(url)
            .query(&[("id", generation_id)])
            .bearer_auth(api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{status}: {body}")));
        }

        let envelope: GenerationEnvelope = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(GenerationStats {
            tokens_prompt: envelope.data.tokens_prompt,
            tokens_completion: envelope.data.tokens_completion,
            total_cost: envelope.data.total_cost,
        })
    }
}

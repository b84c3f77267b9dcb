use super::tool_round;
use super::ChatError;
use crate::llm::{pricing, GenerationStats, ModelRouter, Provider, ProviderKind, Turn};
use crate::tools::ToolExecutor;
use std::sync::Arc;
use std::time::Duration;

/// Normalized reply from whichever provider served the request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub generation_id: String,
    pub stats: GenerationStats,
}

/// Routes a formatted conversation to the provider serving the model and
/// normalizes the result.
pub struct Dispatcher {
    router: ModelRouter,
    primary: Arc<dyn Provider>,
    secondary: Arc<dyn Provider>,
    tools: Arc<dyn ToolExecutor>,
    stats_delay: Duration,
}

impl Dispatcher {
    pub fn new(
        router: ModelRouter,
        primary: Arc<dyn Provider>,
        secondary: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        stats_delay: Duration,
    ) -> Self {
        Self {
            router,
            primary,
            secondary,
            tools,
            stats_delay,
        }
    }

    pub fn default_model(&self) -> &str {
        self.router.default_model()
    }

    pub fn is_allowed(&self, model: &str) -> bool {
        self.router.is_allowed(model)
    }

    pub async fn dispatch(&self, model: &str, turns: &[Turn]) -> Result<Reply, ChatError> {
        if !self.router.is_allowed(model) {
            return Err(ChatError::ModelNotAllowed(model.to_string()));
        }

        match self.router.route(model) {
            ProviderKind::Primary => self.dispatch_primary(model, turns).await,
            ProviderKind::Secondary => self.dispatch_secondary(model, turns).await,
        }
    }

    async fn dispatch_primary(&self, model: &str, turns: &[Turn]) -> Result<Reply, ChatError> {
        let tools = self.tools.definitions();
        let outcome = tool_round::run(
            self.primary.as_ref(),
            self.tools.as_ref(),
            model,
            turns,
            &tools,
        )
        .await?;

        let stats = match outcome.usage {
            Some(usage) => GenerationStats::from_usage(usage, pricing::cost(model, usage)),
            None => GenerationStats::absent(),
        };

        tracing::info!(
            "{} replied: model={}, calls={}, tokens={:?}/{:?}",
            self.primary.name(),
            model,
            outcome.calls,
            stats.tokens_prompt,
            stats.tokens_completion
        );

        Ok(Reply {
            text: outcome.completion.message.joined_text(),
            generation_id: outcome.completion.generation_id,
            stats,
        })
    }

    async fn dispatch_secondary(&self, model: &str, turns: &[Turn]) -> Result<Reply, ChatError> {
        let outcome = tool_round::run(
            self.secondary.as_ref(),
            self.tools.as_ref(),
            model,
            turns,
            &[],
        )
        .await?;
        let generation_id = outcome.completion.generation_id;

        // Usage is published asynchronously after the generation finishes
        tokio::time::sleep(self.stats_delay).await;

        let stats = match self.secondary.generation_stats(&generation_id).await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!(
                    "Error fetching generation stats for {}: {}",
                    generation_id,
                    err
                );
                GenerationStats::absent()
            }
        };

        tracing::info!(
            "{} replied: model={}, generation={}, cost={:?}",
            self.secondary.name(),
            model,
            generation_id,
            stats.total_cost
        );

        Ok(Reply {
            text: outcome.completion.message.joined_text(),
            generation_id,
            stats,
        })
    }
}

use crate::config::LlmConfig;
use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;

/// Upstream provider a model is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Anthropic Messages API
    Primary,
    /// OpenRouter aggregator
    Secondary,
}

/// Decides whether a model may be used and which provider serves it
pub struct ModelRouter {
    default_model: String,
    allowed: HashSet<String>,
    primary_pattern: Regex,
}

impl ModelRouter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            default_model: config.default_model.clone(),
            allowed: config.allowed_models.iter().cloned().collect(),
            primary_pattern: Regex::new(&config.primary_pattern)?,
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn is_allowed(&self, model: &str) -> bool {
        self.allowed.contains(model)
    }

    /// Route a model to the provider that serves it
    pub fn route(&self, model: &str) -> ProviderKind {
        if self.primary_pattern.is_match(model) {
            tracing::debug!(
                "Routing '{}' to primary provider (pattern '{}')",
                model,
                self.primary_pattern.as_str()
            );
            ProviderKind::Primary
        } else {
            tracing::debug!("Routing '{}' to secondary provider", model);
            ProviderKind::Secondary
        }
    }
}

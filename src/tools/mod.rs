pub mod stock;

use crate::llm::ToolSpec;
use crate::market::MarketClient;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// Local tools the primary provider may call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolSpec>;

    /// Run a tool and return its textual result. Failures are reported in
    /// the text so the model can see them.
    async fn execute(&self, name: &str, input: &Value) -> String;
}

/// The built-in tool set.
#[derive(Clone)]
pub struct Toolbox {
    market: Option<MarketClient>,
}

impl Toolbox {
    pub fn new(market: Option<MarketClient>) -> Self {
        Self { market }
    }

    /// A toolbox offering nothing.
    pub fn empty() -> Self {
        Self { market: None }
    }
}

#[async_trait]
impl ToolExecutor for Toolbox {
    fn definitions(&self) -> Vec<ToolSpec> {
        let mut definitions = Vec::new();
        if self.market.is_some() {
            definitions.push(stock::definition());
        }
        definitions
    }

    async fn execute(&self, name: &str, input: &Value) -> String {
        info!("Executing tool: {} with arguments: {}", name, input);

        let result = match (name, &self.market) {
            (stock::TOOL_NAME, Some(market)) => stock::get_stock_price(market, input).await,
            _ => {
                tracing::warn!("Model requested unsupported tool '{}'", name);
                return format!("Unsupported tool: {}", name);
            }
        };

        match result {
            Ok(text) => {
                info!("Tool {} succeeded", name);
                text
            }
            Err(err) => {
                tracing::error!("Tool {} failed: {}", name, err);
                format!("Error: {}", err)
            }
        }
    }
}

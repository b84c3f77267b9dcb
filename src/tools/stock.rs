use crate::llm::ToolSpec;
use crate::market::MarketClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TOOL_NAME: &str = "get_stock_price";

/// Parameters for get_stock_price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPriceParams {
    /// Ticker symbol, e.g. AAPL
    pub ticker: String,
}

/// Look up the latest price for a ticker
pub async fn get_stock_price(market: &MarketClient, input: &Value) -> Result<String> {
    let params: StockPriceParams = serde_json::from_value(input.clone())
        .context("Failed to parse get_stock_price parameters")?;

    let ticker = params.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        anyhow::bail!("ticker must not be empty");
    }

    let quote = market.latest_quote(&ticker).await?;

    Ok(match quote.currency {
        Some(currency) => format!(
            "The current price of {} is ${:.2} {}",
            quote.symbol, quote.price, currency
        ),
        None => format!("The current price of {} is ${:.2}", quote.symbol, quote.price),
    })
}

pub fn definition() -> ToolSpec {
    ToolSpec {
        name: TOOL_NAME.to_string(),
        description: "Get the current stock price for a given ticker symbol.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "ticker": {
                    "type": "string",
                    "description": "The stock ticker symbol, e.g. AAPL for Apple Inc."
                }
            },
            "required": ["ticker"]
        }),
    }
}

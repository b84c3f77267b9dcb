//! Market data lookups against a Yahoo Finance compatible chart API.

use crate::config::MarketConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("quote service returned {status} for {symbol}")]
    Status {
        symbol: String,
        status: reqwest::StatusCode,
    },

    #[error("no market data for {0}")]
    NotFound(String),
}

/// Latest traded price of a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Clone)]
pub struct MarketClient {
    http: reqwest::Client,
    base_url: String,
}

impl MarketClient {
    pub fn new(config: &MarketConfig) -> Result<Self, MarketError> {
        // The chart API rejects requests without a browser-like agent
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; chatrelay/0.1)")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn chart(&self, symbol: &str, range: &str) -> Result<ChartResult, MarketError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        tracing::debug!("Fetching chart for {} (range {})", symbol, range);

        let response = self
            .http
            .get(url)
            .query(&[("interval", "1d"), ("range", range)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketError::NotFound(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(MarketError::Status {
                symbol: symbol.to_string(),
                status,
            });
        }

        let envelope: ChartEnvelope = response.json().await?;
        envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MarketError::NotFound(symbol.to_string()))
    }

    pub async fn latest_quote(&self, symbol: &str) -> Result<Quote, MarketError> {
        let chart = self.chart(symbol, "1d").await?;
        let price = chart
            .meta
            .regular_market_price
            .ok_or_else(|| MarketError::NotFound(symbol.to_string()))?;

        Ok(Quote {
            symbol: chart.meta.symbol,
            price,
            currency: chart.meta.currency,
        })
    }

    /// Daily closing prices, oldest first. Days without a close are skipped.
    pub async fn daily_closes(&self, symbol: &str, range: &str) -> Result<Vec<f64>, MarketError> {
        let chart = self.chart(symbol, range).await?;
        let closes: Vec<f64> = chart
            .indicators
            .into_iter()
            .flat_map(|indicators| indicators.quote)
            .next()
            .map(|series| series.close.into_iter().flatten().collect())
            .unwrap_or_default();

        Ok(closes)
    }
}

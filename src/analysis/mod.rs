//! Statistics on historical daily price changes.

use crate::config::AnalysisConfig;
use crate::market::{MarketClient, MarketError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("need at least 3 closing prices, got {0}")]
    InsufficientData(usize),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Histogram {
    pub bin_edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub today_change: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceChangeAnalysis {
    /// Latest daily change as a fraction (0.01 = +1%)
    pub today_change: f64,
    /// Share of earlier daily changes below today's, 0-100
    pub percentile: f64,
    pub histogram_data: Histogram,
}

/// Fractional change between consecutive prices.
pub fn daily_changes(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect()
}

/// Percentile rank of `score` within `values`: the mean of the strict
/// (`<`) and weak (`<=`) ranks.
pub fn percentile_of_score(values: &[f64], score: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let strict = values.iter().filter(|v| **v < score).count() as f64;
    let weak = values.iter().filter(|v| **v <= score).count() as f64;
    (strict + weak) * 50.0 / n
}

/// Equal-width histogram over the data range. The last bin is closed on the
/// right; a zero-width range is widened to `[min - 0.5, max + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<u64>) {
    let bins = bins.max(1);
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if values.is_empty() {
        lo = 0.0;
        hi = 1.0;
    } else if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();

    let norm = bins as f64 / (hi - lo);
    let mut counts = vec![0u64; bins];
    for value in values {
        let estimate = ((value - lo) * norm) as usize;
        counts[bin_index(*value, estimate, &edges)] += 1;
    }

    (edges, counts)
}

/// Settle a value's bin against the edges themselves, so that
/// `edges[i] <= value < edges[i + 1]` holds whatever rounding the estimate
/// suffered. The last bin is closed on the right.
fn bin_index(value: f64, estimate: usize, edges: &[f64]) -> usize {
    let last = edges.len() - 2;
    let mut index = estimate.min(last);
    if index > 0 && value < edges[index] {
        index -= 1;
    } else if index < last && value >= edges[index + 1] {
        index += 1;
    }
    index
}

/// Analyze the most recent daily change against the full history.
pub fn analyze_closes(closes: &[f64], bins: usize) -> Result<PriceChangeAnalysis, AnalysisError> {
    if closes.len() < 3 {
        return Err(AnalysisError::InsufficientData(closes.len()));
    }

    let changes = daily_changes(closes);
    let (history, today) = changes.split_at(changes.len() - 1);
    let today_change = today[0];

    let percentile = percentile_of_score(history, today_change);
    let (bin_edges, counts) = histogram(&changes, bins);

    Ok(PriceChangeAnalysis {
        today_change,
        percentile,
        histogram_data: Histogram {
            bin_edges,
            counts,
            today_change,
        },
    })
}

/// Fetches the configured price history and analyzes it.
#[derive(Clone)]
pub struct PriceAnalyzer {
    market: MarketClient,
    config: AnalysisConfig,
}

impl PriceAnalyzer {
    pub fn new(market: MarketClient, config: AnalysisConfig) -> Self {
        Self { market, config }
    }

    pub async fn analyze(&self) -> Result<PriceChangeAnalysis, AnalysisError> {
        let closes = self
            .market
            .daily_closes(&self.config.symbol, &self.config.range)
            .await?;

        tracing::info!(
            "Analyzing {} closes for {}",
            closes.len(),
            self.config.symbol
        );

        analyze_closes(&closes, self.config.bins)
    }
}

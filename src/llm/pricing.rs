//! Static price table for locally computed generation cost.

use super::Usage;

/// (input, output) price in dollars per million tokens.
pub type Prices = (f64, f64);

const PRICES: &[(&str, Prices)] = &[
    ("claude-3-5-sonnet-20240620", (3.00, 15.00)),
    ("claude-3-opus-20240229", (15.00, 75.00)),
    ("claude-3-sonnet-20240229", (3.00, 15.00)),
    ("claude-3-haiku-20240307", (0.25, 1.25)),
];

/// Prices for an exact model id; unknown models cost nothing.
pub fn prices(model: &str) -> Prices {
    PRICES
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, prices)| *prices)
        .unwrap_or((0.0, 0.0))
}

pub fn cost(model: &str, usage: Usage) -> f64 {
    let (input_price, output_price) = prices(model);
    (usage.input_tokens as f64 / 1_000_000.0 * input_price)
        + (usage.output_tokens as f64 / 1_000_000.0 * output_price)
}

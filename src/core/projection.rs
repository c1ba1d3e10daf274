//! Joins allocations, holdings and quotes into a blended APY.

use super::allocation::AllocationMatrix;
use super::asset::Asset;
use super::catalog::StrategyCatalog;
use super::holdings::AggregatedHoldings;
use super::quote::{QuoteSet, VenueQuoteKey};
use serde::Serialize;
use tracing::debug;

/// One strategy and the assets that share a quote key within it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionRow {
    pub strategy_id: String,
    pub strategy_name: String,
    pub assets: Vec<Asset>,
    pub quote_key: VenueQuoteKey,
    /// Share of the whole reserve.
    pub allocation: f64,
    pub allocation_amount: f64,
    pub base_rate: f64,
    pub reward_rate: f64,
    pub strategy_rate: f64,
    pub boosted_rate: f64,
    pub weighted: f64,
}

/// A catalog entry left out of the rows because its quote was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnquotedEntry {
    pub strategy_id: String,
    pub assets: Vec<Asset>,
    pub quote_key: VenueQuoteKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionResult {
    pub rows: Vec<ProjectionRow>,
    pub blended_apy: f64,
    pub total_value: f64,
    pub unquoted: Vec<UnquotedEntry>,
}

impl ProjectionResult {
    pub fn is_complete(&self) -> bool {
        self.unquoted.is_empty()
    }
}

/// Projects every catalog entry, in catalog order.
///
/// Within-asset fractions are converted to shares of the whole reserve using
/// the per-asset totals, so assets of very different sizes weigh correctly.
/// Entries without a quote are omitted from the rows and contribute nothing.
pub fn project(
    matrix: &AllocationMatrix,
    boost: f64,
    holdings: &AggregatedHoldings,
    quotes: &QuoteSet,
    catalog: &StrategyCatalog,
) -> ProjectionResult {
    let grand_total = holdings.grand_total;
    let mut rows = Vec::new();
    let mut unquoted = Vec::new();

    for strategy in catalog.strategies() {
        for (quote_key, assets) in strategy.quote_groups() {
            let Some(quote) = quotes.get(&quote_key) else {
                debug!("No quote for {} ({quote_key}), omitting row", strategy.id);
                unquoted.push(UnquotedEntry {
                    strategy_id: strategy.id.clone(),
                    assets,
                    quote_key,
                });
                continue;
            };

            let allocated: f64 = assets
                .iter()
                .map(|asset| matrix.get(*asset, &strategy.id) * holdings.asset_total(*asset))
                .sum();
            let allocation = if grand_total > 0.0 {
                allocated / grand_total
            } else {
                0.0
            };

            let strategy_rate = quote.combined();
            let boosted_rate = strategy_rate * boost;
            let weighted = allocation * boosted_rate;

            rows.push(ProjectionRow {
                strategy_id: strategy.id.clone(),
                strategy_name: strategy.name.clone(),
                assets,
                quote_key,
                allocation,
                allocation_amount: allocation * grand_total,
                base_rate: quote.base,
                reward_rate: quote.reward,
                strategy_rate,
                boosted_rate,
                weighted,
            });
        }
    }

    let blended_apy = rows.iter().map(|row| row.weighted).sum();
    debug!(
        "Projected {} rows ({} unquoted), blended APY {blended_apy}",
        rows.len(),
        unquoted.len()
    );

    ProjectionResult {
        rows,
        blended_apy,
        total_value: grand_total,
        unquoted,
    }
}

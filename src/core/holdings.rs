//! Holdings snapshots and their aggregation into totals and baseline
//! allocation fractions.

use super::allocation::AllocationMatrix;
use super::asset::Asset;
use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Amount held per asset, per strategy id. Captured once per projection cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldingsSnapshot {
    positions: BTreeMap<String, BTreeMap<Asset, f64>>,
}

impl HoldingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the strategy's position in `asset`.
    pub fn add(&mut self, strategy: &str, asset: Asset, amount: f64) {
        *self
            .positions
            .entry(strategy.to_string())
            .or_default()
            .entry(asset)
            .or_insert(0.0) += amount;
    }

    pub fn with(mut self, strategy: &str, asset: Asset, amount: f64) -> Self {
        self.add(strategy, asset, amount);
        self
    }

    /// Amount a strategy holds of an asset, zero when it has no position.
    pub fn amount(&self, strategy: &str, asset: Asset) -> f64 {
        self.positions
            .get(strategy)
            .and_then(|balances| balances.get(&asset))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    /// Fails on the first negative or non-finite amount.
    pub fn check_amounts(&self) -> Result<()> {
        for (strategy, balances) in &self.positions {
            for (asset, amount) in balances {
                if !amount.is_finite() {
                    bail!("Non-finite {asset} balance for strategy {strategy}");
                }
                if *amount < 0.0 {
                    bail!("Negative {asset} balance {amount} for strategy {strategy}");
                }
            }
        }
        Ok(())
    }
}

/// Output of [`aggregate_holdings`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedHoldings {
    /// Present for every asset, zero when nothing is held.
    pub per_asset_total: BTreeMap<Asset, f64>,
    pub grand_total: f64,
    pub baseline: AllocationMatrix,
}

impl AggregatedHoldings {
    pub fn asset_total(&self, asset: Asset) -> f64 {
        self.per_asset_total.get(&asset).copied().unwrap_or(0.0)
    }
}

/// Computes per-asset totals, the grand total and the baseline allocation
/// fractions implied by a snapshot.
///
/// An asset nobody holds gets a baseline of zero for every strategy instead
/// of a division by zero.
pub fn aggregate_holdings(snapshot: &HoldingsSnapshot) -> AggregatedHoldings {
    let per_asset_total: BTreeMap<Asset, f64> = Asset::ALL
        .iter()
        .map(|asset| {
            let total = snapshot
                .positions
                .values()
                .filter_map(|balances| balances.get(asset))
                .sum::<f64>();
            (*asset, total)
        })
        .collect();

    let grand_total = per_asset_total.values().sum::<f64>();

    let mut baseline = AllocationMatrix::new();
    for (strategy, balances) in &snapshot.positions {
        for (asset, amount) in balances {
            let total = per_asset_total[asset];
            let fraction = if total > 0.0 { amount / total } else { 0.0 };
            baseline.set(*asset, strategy, fraction);
        }
    }

    debug!(
        "Aggregated {} strategies, grand total {grand_total}",
        snapshot.positions.len()
    );

    AggregatedHoldings {
        per_asset_total,
        grand_total,
        baseline,
    }
}

/// Holdings plus the circulating supply they back, as reported by a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReserveData {
    pub holdings: HoldingsSnapshot,
    pub total_supply: Option<f64>,
}

impl ReserveData {
    /// Reserve value over circulating supply, when the supply is known.
    pub fn backing_ratio(&self, grand_total: f64) -> Option<f64> {
        self.total_supply
            .filter(|supply| *supply > 0.0)
            .map(|supply| grand_total / supply)
    }
}

#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    async fn fetch_reserve(&self) -> Result<ReserveData>;
}

/// Holdings written directly in the configuration file.
pub struct StaticHoldings {
    holdings: HoldingsSnapshot,
}

impl StaticHoldings {
    pub fn new(holdings: HoldingsSnapshot) -> Self {
        Self { holdings }
    }
}

#[async_trait]
impl HoldingsProvider for StaticHoldings {
    async fn fetch_reserve(&self) -> Result<ReserveData> {
        Ok(ReserveData {
            holdings: self.holdings.clone(),
            total_supply: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HoldingsSnapshot {
        HoldingsSnapshot::new()
            .with("aave-v3", Asset::Usdc, 600.0)
            .with("aave-v3", Asset::Usdt, 250.0)
            .with("morpho-usdc", Asset::Usdc, 400.0)
            .with("sdai", Asset::Dai, 0.1)
            .with("curve-3pool", Asset::Usdt, 0.2)
    }

    #[test]
    fn test_totals_sum_exactly_to_grand_total() {
        let aggregated = aggregate_holdings(&sample());
        assert_eq!(aggregated.per_asset_total.len(), Asset::ALL.len());
        assert_eq!(aggregated.asset_total(Asset::Usdc), 1000.0);
        let summed: f64 = aggregated.per_asset_total.values().sum();
        assert_eq!(summed, aggregated.grand_total);
    }

    #[test]
    fn test_baseline_fractions() {
        let aggregated = aggregate_holdings(&sample());
        let baseline = &aggregated.baseline;
        assert!((baseline.get(Asset::Usdc, "aave-v3") - 0.6).abs() < 1e-12);
        assert!((baseline.get(Asset::Usdc, "morpho-usdc") - 0.4).abs() < 1e-12);
        assert!((baseline.get(Asset::Dai, "sdai") - 1.0).abs() < 1e-12);
        // Strategies without a position read as zero.
        assert_eq!(baseline.get(Asset::Dai, "aave-v3"), 0.0);
        assert_eq!(baseline.get(Asset::Usdc, "not-in-snapshot"), 0.0);
    }

    #[test]
    fn test_zero_asset_total_has_zero_baseline() {
        let snapshot = HoldingsSnapshot::new()
            .with("aave-v3", Asset::Dai, 0.0)
            .with("sdai", Asset::Dai, 0.0)
            .with("aave-v3", Asset::Usdc, 10.0);
        let aggregated = aggregate_holdings(&snapshot);
        assert_eq!(aggregated.asset_total(Asset::Dai), 0.0);
        for strategy in ["aave-v3", "sdai"] {
            let fraction = aggregated.baseline.get(Asset::Dai, strategy);
            assert_eq!(fraction, 0.0);
            assert!(!fraction.is_nan());
        }
        assert_eq!(aggregated.baseline.get(Asset::Usdc, "aave-v3"), 1.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let aggregated = aggregate_holdings(&HoldingsSnapshot::new());
        assert_eq!(aggregated.grand_total, 0.0);
        assert!(aggregated.per_asset_total.values().all(|t| *t == 0.0));
    }

    #[test]
    fn test_check_amounts() {
        assert!(sample().check_amounts().is_ok());

        let negative = sample().with("morpho-usdc", Asset::Usdc, -500.0);
        let err = negative.check_amounts().unwrap_err();
        assert!(err.to_string().contains("Negative USDC balance"));

        let infinite = HoldingsSnapshot::new().with("sdai", Asset::Dai, f64::INFINITY);
        assert!(infinite.check_amounts().is_err());
        let nan = HoldingsSnapshot::new().with("sdai", Asset::Dai, f64::NAN);
        assert!(nan.check_amounts().is_err());
    }

    #[test]
    fn test_backing_ratio() {
        let reserve = ReserveData {
            holdings: HoldingsSnapshot::new(),
            total_supply: Some(200.0),
        };
        assert_eq!(reserve.backing_ratio(210.0), Some(1.05));
        let unknown = ReserveData::default();
        assert_eq!(unknown.backing_ratio(210.0), None);
    }

    #[tokio::test]
    async fn test_static_holdings_provider() {
        let provider = StaticHoldings::new(sample());
        let reserve = provider.fetch_reserve().await.unwrap();
        assert_eq!(reserve.holdings, sample());
        assert!(reserve.total_supply.is_none());
    }
}

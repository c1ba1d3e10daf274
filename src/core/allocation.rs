//! The user-editable allocation matrix and boost multiplier.

use super::asset::Asset;
use super::catalog::StrategyCatalog;
use super::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Fraction of each asset's total assigned to each strategy.
///
/// Absent cells read as zero. Fractions are stored exactly as given: a row
/// that does not sum to one is the caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationMatrix {
    cells: BTreeMap<Asset, BTreeMap<String, f64>>,
}

impl AllocationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset: Asset, strategy: &str) -> f64 {
        self.cells
            .get(&asset)
            .and_then(|row| row.get(strategy))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, asset: Asset, strategy: &str, fraction: f64) {
        self.cells
            .entry(asset)
            .or_default()
            .insert(strategy.to_string(), fraction);
    }

    /// Sum of fractions per asset that has at least one cell.
    pub fn asset_sums(&self) -> BTreeMap<Asset, f64> {
        self.cells
            .iter()
            .map(|(asset, row)| (*asset, row.values().sum()))
            .collect()
    }
}

/// Holds the live allocation matrix and boost multiplier.
///
/// Every mutation bumps [`AllocationModel::revision`], which is how cached
/// projections know they are stale.
#[derive(Debug, Clone)]
pub struct AllocationModel {
    catalog: Arc<StrategyCatalog>,
    matrix: AllocationMatrix,
    boost: f64,
    revision: u64,
}

impl AllocationModel {
    pub fn new(catalog: Arc<StrategyCatalog>) -> Self {
        Self {
            catalog,
            matrix: AllocationMatrix::new(),
            boost: 1.0,
            revision: 0,
        }
    }

    /// Stores one cell. Fractions outside [0, 1] are kept as-is.
    pub fn set_allocation(
        &mut self,
        asset: Asset,
        strategy: &str,
        fraction: f64,
    ) -> CoreResult<()> {
        let Some(entry) = self.catalog.get(strategy) else {
            return Err(CoreError::unknown_strategy(strategy));
        };
        if !entry.scope.contains(asset) {
            debug!("Strategy {strategy} does not hold {asset}; storing {fraction} anyway");
        }
        self.matrix.set(asset, strategy, fraction);
        self.touch();
        Ok(())
    }

    /// Like [`AllocationModel::set_allocation`] but takes the asset symbol.
    pub fn set_allocation_str(
        &mut self,
        asset: &str,
        strategy: &str,
        fraction: f64,
    ) -> CoreResult<()> {
        let asset: Asset = asset.parse()?;
        self.set_allocation(asset, strategy, fraction)
    }

    /// Negative multipliers are accepted; no business rules are applied.
    pub fn set_boost_multiplier(&mut self, value: f64) {
        self.boost = value;
        self.touch();
    }

    /// Replaces the whole matrix, typically with the baseline of a fresh
    /// holdings snapshot.
    pub fn seed(&mut self, baseline: AllocationMatrix) {
        self.matrix = baseline;
        self.touch();
    }

    pub fn matrix(&self) -> &AllocationMatrix {
        &self.matrix
    }

    pub fn boost(&self) -> f64 {
        self.boost
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> AllocationModel {
        AllocationModel::new(Arc::new(StrategyCatalog::default()))
    }

    #[test]
    fn test_set_allocation_known_strategy() {
        let mut model = model();
        model.set_allocation(Asset::Usdc, "aave-v3", 0.7).unwrap();
        assert_eq!(model.matrix().get(Asset::Usdc, "aave-v3"), 0.7);
        assert_eq!(model.matrix().get(Asset::Usdc, "morpho-usdc"), 0.0);
    }

    #[test]
    fn test_set_allocation_rejects_unknown_identifiers() {
        let mut model = model();
        let err = model.set_allocation(Asset::Usdc, "compound", 0.5).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
        assert!(err.to_string().contains("compound"));

        let err = model.set_allocation_str("LUSD", "aave-v3", 0.5).unwrap_err();
        assert!(err.to_string().contains("LUSD"));
        assert_eq!(model.revision(), 0);
    }

    #[test]
    fn test_out_of_range_values_are_not_clamped() {
        let mut model = model();
        model.set_allocation(Asset::Dai, "sdai", 1.4).unwrap();
        model.set_allocation(Asset::Dai, "aave-v3", -0.2).unwrap();
        model.set_boost_multiplier(-1.0);
        assert_eq!(model.matrix().get(Asset::Dai, "sdai"), 1.4);
        assert_eq!(model.matrix().get(Asset::Dai, "aave-v3"), -0.2);
        assert_eq!(model.boost(), -1.0);
        assert!((model.matrix().asset_sums()[&Asset::Dai] - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_seed_then_override_single_cell() {
        let mut model = model();
        let mut baseline = AllocationMatrix::new();
        baseline.set(Asset::Usdc, "aave-v3", 0.6);
        baseline.set(Asset::Usdc, "morpho-usdc", 0.4);
        model.set_allocation(Asset::Dai, "sdai", 1.0).unwrap();

        model.seed(baseline);
        assert_eq!(model.matrix().get(Asset::Dai, "sdai"), 0.0);

        model.set_allocation(Asset::Usdc, "aave-v3", 0.1).unwrap();
        assert_eq!(model.matrix().get(Asset::Usdc, "aave-v3"), 0.1);
        assert_eq!(model.matrix().get(Asset::Usdc, "morpho-usdc"), 0.4);
    }

    #[test]
    fn test_every_mutation_bumps_revision() {
        let mut model = model();
        let start = model.revision();
        model.seed(AllocationMatrix::new());
        model.set_boost_multiplier(2.0);
        model.set_allocation(Asset::Usdt, "curve-3pool", 0.3).unwrap();
        assert_eq!(model.revision(), start + 3);
    }
}

//! One projection cycle: fixed holdings and quotes, a live allocation model,
//! and a result recomputed only when the model changes.

use super::allocation::AllocationModel;
use super::asset::Asset;
use super::catalog::StrategyCatalog;
use super::error::CoreResult;
use super::holdings::{AggregatedHoldings, HoldingsSnapshot, aggregate_holdings};
use super::projection::{ProjectionResult, project};
use super::quote::QuoteSet;
use std::sync::Arc;
use tracing::debug;

pub struct YieldSimulator {
    holdings: AggregatedHoldings,
    quotes: QuoteSet,
    model: AllocationModel,
    cached: Option<(u64, ProjectionResult)>,
}

impl YieldSimulator {
    /// Aggregates the snapshot and seeds the allocation matrix from its
    /// baseline. The boost starts at 1.
    pub fn new(
        catalog: Arc<StrategyCatalog>,
        snapshot: &HoldingsSnapshot,
        quotes: QuoteSet,
    ) -> Self {
        let holdings = aggregate_holdings(snapshot);
        let mut model = AllocationModel::new(catalog);
        model.seed(holdings.baseline.clone());
        Self {
            holdings,
            quotes,
            model,
            cached: None,
        }
    }

    /// Starts a new cycle from fresh data. Manual edits are discarded; the
    /// boost multiplier is kept.
    pub fn refresh(&mut self, snapshot: &HoldingsSnapshot, quotes: QuoteSet) {
        self.holdings = aggregate_holdings(snapshot);
        self.quotes = quotes;
        self.model.seed(self.holdings.baseline.clone());
        self.cached = None;
    }

    pub fn set_allocation(
        &mut self,
        asset: Asset,
        strategy: &str,
        fraction: f64,
    ) -> CoreResult<()> {
        self.model.set_allocation(asset, strategy, fraction)
    }

    pub fn set_allocation_str(
        &mut self,
        asset: &str,
        strategy: &str,
        fraction: f64,
    ) -> CoreResult<()> {
        self.model.set_allocation_str(asset, strategy, fraction)
    }

    pub fn set_boost_multiplier(&mut self, value: f64) {
        self.model.set_boost_multiplier(value);
    }

    /// The projection for the current model, recomputed if anything changed
    /// since the last call.
    pub fn result(&mut self) -> &ProjectionResult {
        let revision = self.model.revision();
        let stale = !matches!(&self.cached, Some((cached_rev, _)) if *cached_rev == revision);
        if stale {
            self.cached = None;
        }
        let (_, result) = self.cached.get_or_insert_with(|| {
            debug!("Recomputing projection at revision {revision}");
            let result = project(
                self.model.matrix(),
                self.model.boost(),
                &self.holdings,
                &self.quotes,
                self.model.catalog(),
            );
            (revision, result)
        });
        result
    }

    pub fn holdings(&self) -> &AggregatedHoldings {
        &self.holdings
    }

    pub fn model(&self) -> &AllocationModel {
        &self.model
    }

    #[cfg(test)]
    fn cached_revision(&self) -> Option<u64> {
        self.cached.as_ref().map(|(revision, _)| *revision)
    }
}

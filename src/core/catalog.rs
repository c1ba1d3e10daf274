//! The fixed strategy catalog.

use super::asset::Asset;
use super::quote::{Venue, VenueQuoteKey};
use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Which assets a strategy can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Scope {
    Single(Asset),
    Basket(Vec<Asset>),
}

impl Scope {
    pub fn assets(&self) -> &[Asset] {
        match self {
            Scope::Single(asset) => std::slice::from_ref(asset),
            Scope::Basket(assets) => assets,
        }
    }

    pub fn contains(&self, asset: Asset) -> bool {
        self.assets().contains(&asset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub scope: Scope,
    /// Quote key per asset in scope.
    pub quotes: BTreeMap<Asset, VenueQuoteKey>,
}

impl Strategy {
    /// Single-asset strategy quoted by one key.
    pub fn single(id: &str, name: &str, asset: Asset, key: VenueQuoteKey) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            scope: Scope::Single(asset),
            quotes: BTreeMap::from([(asset, key)]),
        }
    }

    /// Basket strategy sharing one quote key across its assets.
    pub fn basket(id: &str, name: &str, assets: &[Asset], key: VenueQuoteKey) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            scope: Scope::Basket(assets.to_vec()),
            quotes: assets.iter().map(|a| (*a, key.clone())).collect(),
        }
    }

    /// Basket strategy with a dedicated quote key per asset.
    pub fn basket_per_asset(id: &str, name: &str, keys: &[(Asset, VenueQuoteKey)]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            scope: Scope::Basket(keys.iter().map(|(a, _)| *a).collect()),
            quotes: keys.iter().cloned().collect(),
        }
    }

    pub fn quote_key(&self, asset: Asset) -> Option<&VenueQuoteKey> {
        self.quotes.get(&asset)
    }

    /// Groups the scope by quote key, keeping first-appearance order. Each
    /// group becomes one projection row.
    pub fn quote_groups(&self) -> Vec<(VenueQuoteKey, Vec<Asset>)> {
        let mut groups: Vec<(VenueQuoteKey, Vec<Asset>)> = Vec::new();
        for asset in self.scope.assets() {
            let Some(key) = self.quotes.get(asset) else {
                continue;
            };
            match groups.iter_mut().find(|(k, _)| k == key) {
                Some((_, assets)) => assets.push(*asset),
                None => groups.push((key.clone(), vec![*asset])),
            }
        }
        groups
    }
}

/// Ordered, validated list of strategies. Projection rows follow this order.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyCatalog {
    strategies: Vec<Strategy>,
}

impl StrategyCatalog {
    pub fn new(strategies: Vec<Strategy>) -> Result<Self> {
        let mut seen = HashSet::new();
        for strategy in &strategies {
            if strategy.id.trim().is_empty() {
                bail!("Strategy id must not be empty");
            }
            if !seen.insert(strategy.id.as_str()) {
                bail!("Duplicate strategy id '{}'", strategy.id);
            }
            let assets = strategy.scope.assets();
            if assets.is_empty() {
                bail!("Strategy '{}' has an empty scope", strategy.id);
            }
            let unique: HashSet<_> = assets.iter().collect();
            if unique.len() != assets.len() {
                bail!("Strategy '{}' lists an asset twice", strategy.id);
            }
            for asset in assets {
                if !strategy.quotes.contains_key(asset) {
                    bail!("Strategy '{}' has no quote key for {}", strategy.id, asset);
                }
            }
            if let Some(extra) = strategy.quotes.keys().find(|a| !strategy.scope.contains(**a)) {
                bail!(
                    "Strategy '{}' has a quote key for {} which is outside its scope",
                    strategy.id,
                    extra
                );
            }
        }
        Ok(Self { strategies })
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn get(&self, id: &str) -> Option<&Strategy> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Distinct markets referenced per venue.
    pub fn markets_by_venue(&self) -> BTreeMap<Venue, Vec<String>> {
        let mut markets: BTreeMap<Venue, Vec<String>> = BTreeMap::new();
        for strategy in &self.strategies {
            for (key, _) in strategy.quote_groups() {
                let entry = markets.entry(key.venue).or_default();
                if !entry.contains(&key.market) {
                    entry.push(key.market.clone());
                }
            }
        }
        markets
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        let lending = |symbol: &str| VenueQuoteKey::new(Venue::Lending, symbol);
        Self {
            strategies: vec![
                Strategy::basket_per_asset(
                    "aave-v3",
                    "Aave v3 Lending",
                    &[
                        (Asset::Usdc, lending("USDC")),
                        (Asset::Usdt, lending("USDT")),
                        (Asset::Dai, lending("DAI")),
                    ],
                ),
                Strategy::single(
                    "sdai",
                    "Savings DAI",
                    Asset::Dai,
                    VenueQuoteKey::new(Venue::Vault, "sDAI"),
                ),
                Strategy::basket(
                    "curve-3pool",
                    "Curve 3pool",
                    &[Asset::Usdc, Asset::Usdt, Asset::Dai],
                    VenueQuoteKey::new(Venue::Llama, "curve-dex/DAI-USDC-USDT"),
                ),
                Strategy::single(
                    "morpho-usdc",
                    "Morpho USDC Vault",
                    Asset::Usdc,
                    VenueQuoteKey::new(Venue::Vault, "morpho-usdc"),
                ),
            ],
        }
    }
}

use super::util::{RawNumber, get_text};
use crate::core::{Asset, HoldingsProvider, HoldingsSnapshot, ReserveData};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveResponse {
    #[serde(default)]
    total_supply: Option<RawNumber>,
    strategies: Vec<StrategyBalances>,
}

#[derive(Debug, Deserialize)]
struct StrategyBalances {
    id: String,
    #[serde(default)]
    balances: BTreeMap<String, RawNumber>,
}

/// Parses a reserve report into holdings. Unknown asset symbols are skipped;
/// negative or unreadable balances fail the whole report.
pub fn parse_reserve(body: &str) -> Result<ReserveData> {
    let response: ReserveResponse =
        serde_json::from_str(body).context("Failed to parse reserve response")?;

    let mut holdings = HoldingsSnapshot::new();
    for strategy in &response.strategies {
        for (symbol, raw) in &strategy.balances {
            let Ok(asset) = symbol.parse::<Asset>() else {
                debug!("Skipping unknown asset {symbol} in strategy {}", strategy.id);
                continue;
            };
            let amount = raw.value("balance").ok_or_else(|| {
                anyhow!("Unreadable {symbol} balance for strategy {}", strategy.id)
            })?;
            if amount < 0.0 {
                bail!("Negative {symbol} balance {amount} for strategy {}", strategy.id);
            }
            holdings.add(&strategy.id, asset, amount);
        }
    }

    let total_supply = response
        .total_supply
        .as_ref()
        .and_then(|v| v.value("totalSupply"));

    Ok(ReserveData {
        holdings,
        total_supply,
    })
}

pub struct ReserveApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl ReserveApiProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HoldingsProvider for ReserveApiProvider {
    #[instrument(name = "ReserveFetch", skip(self))]
    async fn fetch_reserve(&self) -> Result<ReserveData> {
        let url = format!("{}/reserve", self.base_url);
        debug!("Requesting reserve holdings from {}", url);
        let body = get_text(&self.client, &url)
            .await
            .with_context(|| format!("Failed to fetch reserve holdings from {url}"))?;
        parse_reserve(&body)
    }
}

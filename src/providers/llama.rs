use super::util::{RawNumber, get_text, percent_to_fraction};
use crate::core::{QuoteProvider, QuoteSet, Venue, VenueQuoteKey, YieldQuote};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    #[serde(default)]
    data: Vec<Pool>,
}

#[derive(Debug, Deserialize)]
struct Pool {
    pool: String,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default, rename = "apyBase")]
    apy_base: Option<RawNumber>,
    #[serde(default, rename = "apyReward")]
    apy_reward: Option<RawNumber>,
}

impl Pool {
    /// A market matches by pool id, or by `project/symbol` ignoring case.
    fn matches(&self, market: &str) -> bool {
        if self.pool == market {
            return true;
        }
        match (&self.project, &self.symbol) {
            (Some(project), Some(symbol)) => {
                format!("{project}/{symbol}").eq_ignore_ascii_case(market)
            }
            _ => false,
        }
    }
}

/// Normalizes a yields pool listing. Percent values, nulls read as zero.
/// When several pools match a `project/symbol` market the first one wins.
pub fn normalize(body: &str, markets: &[String]) -> Result<QuoteSet> {
    let response: PoolsResponse =
        serde_json::from_str(body).context("Failed to parse yields pool response")?;

    let mut quotes = QuoteSet::new();
    for market in markets {
        let Some(pool) = response.data.iter().find(|p| p.matches(market)) else {
            debug!("No pool found for llama market {market}");
            continue;
        };
        let base = percent_to_fraction(pool.apy_base.as_ref().and_then(|v| v.value("apyBase")));
        let reward =
            percent_to_fraction(pool.apy_reward.as_ref().and_then(|v| v.value("apyReward")));
        quotes.insert(
            VenueQuoteKey::new(Venue::Llama, market),
            YieldQuote::new(base, reward),
        );
    }
    Ok(quotes)
}

pub struct LlamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl LlamaProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl QuoteProvider for LlamaProvider {
    fn venue(&self) -> Venue {
        Venue::Llama
    }

    #[instrument(name = "LlamaQuoteFetch", skip(self, markets), fields(markets = markets.len()))]
    async fn fetch_quotes(&self, markets: &[String]) -> Result<QuoteSet> {
        let url = format!("{}/pools", self.base_url);
        debug!("Requesting pools from {}", url);
        let body = get_text(&self.client, &url)
            .await
            .with_context(|| format!("Failed to fetch pools from {url}"))?;
        normalize(&body, markets)
    }
}

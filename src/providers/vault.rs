use super::util::{RawNumber, bps_to_fraction, get_text};
use crate::core::{QuoteProvider, QuoteSet, Venue, VenueQuoteKey, YieldQuote};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct VaultsResponse {
    #[serde(default)]
    vaults: Vec<VaultEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultEntry {
    name: String,
    #[serde(default)]
    apy_bps: Option<RawNumber>,
    #[serde(default)]
    incentive_bps: Option<RawNumber>,
}

/// Normalizes a vault listing quoted in basis points.
pub fn normalize(body: &str, markets: &[String]) -> Result<QuoteSet> {
    let response: VaultsResponse =
        serde_json::from_str(body).context("Failed to parse vaults response")?;

    let mut quotes = QuoteSet::new();
    for market in markets {
        let Some(vault) = response
            .vaults
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(market))
        else {
            debug!("Vault venue does not list {market}");
            continue;
        };
        let base = bps_to_fraction(vault.apy_bps.as_ref().and_then(|v| v.value("apyBps")));
        let reward =
            bps_to_fraction(vault.incentive_bps.as_ref().and_then(|v| v.value("incentiveBps")));
        quotes.insert(
            VenueQuoteKey::new(Venue::Vault, market),
            YieldQuote::new(base, reward),
        );
    }
    Ok(quotes)
}

pub struct VaultProvider {
    base_url: String,
    client: reqwest::Client,
}

impl VaultProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl QuoteProvider for VaultProvider {
    fn venue(&self) -> Venue {
        Venue::Vault
    }

    #[instrument(name = "VaultQuoteFetch", skip(self, markets), fields(markets = markets.len()))]
    async fn fetch_quotes(&self, markets: &[String]) -> Result<QuoteSet> {
        let url = format!("{}/vaults", self.base_url);
        debug!("Requesting vaults from {}", url);
        let body = get_text(&self.client, &url)
            .await
            .with_context(|| format!("Failed to fetch vaults from {url}"))?;
        normalize(&body, markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_JSON: &str = r#"{
        "vaults": [
            {"name": "sDAI", "apyBps": 500},
            {"name": "morpho-usdc", "apyBps": "480", "incentiveBps": 25},
            {"name": "legacy-vault", "apyBps": 9000}
        ]
    }"#;

    fn markets(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_basis_points() {
        let quotes = normalize(MOCK_JSON, &markets(&["sDAI", "morpho-usdc"])).unwrap();
        assert_eq!(quotes.len(), 2);

        let sdai = quotes[&VenueQuoteKey::new(Venue::Vault, "sDAI")];
        assert_eq!(sdai.base, 0.05);
        assert_eq!(sdai.reward, 0.0);

        let morpho = quotes[&VenueQuoteKey::new(Venue::Vault, "morpho-usdc")];
        assert_eq!(morpho.base, 0.048);
        assert_eq!(morpho.reward, 0.0025);
    }

    #[test]
    fn test_normalize_ignores_unrequested_vaults() {
        let quotes = normalize(MOCK_JSON, &markets(&["sdai"])).unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(quotes.contains_key(&VenueQuoteKey::new(Venue::Vault, "sdai")));
    }

    #[tokio::test]
    async fn test_fetch_quotes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vaults"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_JSON))
            .mount(&mock_server)
            .await;

        let provider = VaultProvider::new(&mock_server.uri());
        let quotes = provider.fetch_quotes(&markets(&["sDAI"])).await.unwrap();
        assert_eq!(quotes.len(), 1);
    }
}

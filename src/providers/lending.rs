use super::util::{RawNumber, get_text, percent_to_fraction};
use crate::core::{QuoteProvider, QuoteSet, Venue, VenueQuoteKey, YieldQuote};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Market {
    symbol: String,
    #[serde(default)]
    supply_apy: Option<RawNumber>,
    #[serde(default)]
    reward_apy: Option<RawNumber>,
}

/// Normalizes a lending market listing. Rates are percent strings such as
/// `"5.00"`; symbols match case-insensitively and keep the caller's spelling.
pub fn normalize(body: &str, markets: &[String]) -> Result<QuoteSet> {
    let response: MarketsResponse =
        serde_json::from_str(body).context("Failed to parse lending markets response")?;

    let mut quotes = QuoteSet::new();
    for market in markets {
        let Some(entry) = response
            .markets
            .iter()
            .find(|m| m.symbol.eq_ignore_ascii_case(market))
        else {
            debug!("Lending venue does not list {market}");
            continue;
        };
        let base =
            percent_to_fraction(entry.supply_apy.as_ref().and_then(|v| v.value("supplyApy")));
        let reward =
            percent_to_fraction(entry.reward_apy.as_ref().and_then(|v| v.value("rewardApy")));
        quotes.insert(
            VenueQuoteKey::new(Venue::Lending, market),
            YieldQuote::new(base, reward),
        );
    }
    Ok(quotes)
}

pub struct LendingProvider {
    base_url: String,
    client: reqwest::Client,
}

impl LendingProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl QuoteProvider for LendingProvider {
    fn venue(&self) -> Venue {
        Venue::Lending
    }

    #[instrument(name = "LendingQuoteFetch", skip(self, markets), fields(markets = markets.len()))]
    async fn fetch_quotes(&self, markets: &[String]) -> Result<QuoteSet> {
        let url = format!("{}/markets", self.base_url);
        debug!("Requesting lending markets from {}", url);
        let body = get_text(&self.client, &url)
            .await
            .with_context(|| format!("Failed to fetch lending markets from {url}"))?;
        normalize(&body, markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_JSON: &str = r#"{
        "markets": [
            {"symbol": "usdc", "supplyApy": "5.00", "rewardApy": "0.25"},
            {"symbol": "USDT", "supplyApy": 3.5},
            {"symbol": "DAI", "supplyApy": "pending", "rewardApy": "1.00"},
            {"symbol": "GHO", "supplyApy": "7.00"}
        ]
    }"#;

    fn markets(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_percent_strings() {
        let quotes = normalize(MOCK_JSON, &markets(&["USDC", "USDT", "DAI"])).unwrap();
        assert_eq!(quotes.len(), 3);

        let usdc = quotes[&VenueQuoteKey::new(Venue::Lending, "USDC")];
        assert_eq!(usdc.base, 0.05);
        assert_eq!(usdc.reward, 0.0025);

        let usdt = quotes[&VenueQuoteKey::new(Venue::Lending, "USDT")];
        assert_eq!(usdt.base, 0.035);
        assert_eq!(usdt.reward, 0.0);

        // Unparseable rates read as zero rather than failing the venue.
        let dai = quotes[&VenueQuoteKey::new(Venue::Lending, "DAI")];
        assert_eq!(dai.base, 0.0);
        assert_eq!(dai.reward, 0.01);
    }

    #[test]
    fn test_normalize_drops_unlisted_symbols() {
        let quotes = normalize(MOCK_JSON, &markets(&["USDC"])).unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(!quotes.keys().any(|k| k.market == "GHO"));

        let quotes = normalize(r#"{"markets": []}"#, &markets(&["USDC"])).unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_quotes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_JSON))
            .mount(&mock_server)
            .await;

        let provider = LendingProvider::new(&format!("{}/", mock_server.uri()));
        let quotes = provider
            .fetch_quotes(&markets(&["USDC", "USDT"]))
            .await
            .unwrap();
        assert_eq!(quotes.len(), 2);
    }
}

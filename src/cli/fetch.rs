//! Gathers one cycle of external data: holdings and every venue's quotes,
//! fetched concurrently.

use super::ui;
use crate::core::{HoldingsProvider, QuoteProvider, QuoteSet, ReserveData, StrategyCatalog, Venue};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

/// Inputs for one projection cycle.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub reserve: ReserveData,
    pub quotes: QuoteSet,
    /// Venues whose fetch failed, with the error text.
    pub failed_venues: Vec<(Venue, String)>,
    pub captured_at: DateTime<Utc>,
}

/// Fetches quotes for every venue the catalog references.
///
/// A venue that fails or has no provider configured contributes no quotes;
/// the rows relying on it drop out of the projection.
pub async fn fetch_quotes(
    providers: &[Box<dyn QuoteProvider>],
    catalog: &StrategyCatalog,
) -> (QuoteSet, Vec<(Venue, String)>) {
    let markets = catalog.markets_by_venue();
    for venue in markets.keys() {
        if !providers.iter().any(|p| p.venue() == *venue) {
            warn!("No provider configured for venue {venue}; its strategies have no quotes");
        }
    }

    let requests: Vec<_> = providers
        .iter()
        .filter_map(|provider| {
            markets
                .get(&provider.venue())
                .map(|venue_markets| (provider, venue_markets))
        })
        .collect();

    let pb = ui::new_progress_bar(requests.len() as u64, true);
    pb.set_message("Fetching quotes...");

    let futures = requests.into_iter().map(|(provider, venue_markets)| {
        let pb_clone = pb.clone();
        async move {
            let result = provider.fetch_quotes(venue_markets).await;
            pb_clone.inc(1);
            (provider.venue(), result)
        }
    });
    let results = join_all(futures).await;
    pb.finish_and_clear();

    let mut quotes = QuoteSet::new();
    let mut failed = Vec::new();
    for (venue, result) in results {
        match result {
            Ok(venue_quotes) => {
                debug!("Venue {venue} returned {} quotes", venue_quotes.len());
                quotes.extend(venue_quotes);
            }
            Err(e) => {
                warn!("Quote fetch for venue {venue} failed: {e:#}");
                failed.push((venue, format!("{e:#}")));
            }
        }
    }
    (quotes, failed)
}

/// Fetches holdings and quotes together. A holdings failure aborts.
pub async fn fetch_market_data(
    holdings: &dyn HoldingsProvider,
    providers: &[Box<dyn QuoteProvider>],
    catalog: &StrategyCatalog,
) -> Result<MarketData> {
    info!("Fetching reserve holdings and venue quotes");
    let (reserve, (quotes, failed_venues)) =
        futures::join!(holdings.fetch_reserve(), fetch_quotes(providers, catalog));
    let reserve = reserve.context("Failed to fetch reserve holdings")?;

    Ok(MarketData {
        reserve,
        quotes,
        failed_venues,
        captured_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::holdings::StaticHoldings;
    use crate::core::{Asset, HoldingsSnapshot, VenueQuoteKey, YieldQuote};
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct MockQuoteProvider {
        venue: Venue,
        fail: bool,
    }

    #[async_trait]
    impl QuoteProvider for MockQuoteProvider {
        fn venue(&self) -> Venue {
            self.venue
        }

        async fn fetch_quotes(&self, markets: &[String]) -> Result<QuoteSet> {
            if self.fail {
                return Err(anyhow!("venue unavailable"));
            }
            Ok(markets
                .iter()
                .map(|m| (VenueQuoteKey::new(self.venue, m), YieldQuote::new(0.05, 0.0)))
                .collect())
        }
    }

    struct FailingHoldings;

    #[async_trait]
    impl HoldingsProvider for FailingHoldings {
        async fn fetch_reserve(&self) -> Result<ReserveData> {
            Err(anyhow!("rpc down"))
        }
    }

    #[tokio::test]
    async fn test_failed_venue_is_reported_not_fatal() {
        let providers: Vec<Box<dyn QuoteProvider>> = vec![
            Box::new(MockQuoteProvider {
                venue: Venue::Lending,
                fail: false,
            }),
            Box::new(MockQuoteProvider {
                venue: Venue::Vault,
                fail: true,
            }),
        ];
        let holdings = StaticHoldings::new(HoldingsSnapshot::new().with("sdai", Asset::Dai, 1.0));
        let catalog = StrategyCatalog::default();

        let data = fetch_market_data(&holdings, &providers, &catalog).await.unwrap();
        assert_eq!(data.quotes.len(), 3);
        assert!(data.quotes.keys().all(|k| k.venue == Venue::Lending));
        assert_eq!(data.failed_venues.len(), 1);
        assert_eq!(data.failed_venues[0].0, Venue::Vault);
        assert_eq!(data.reserve.holdings.amount("sdai", Asset::Dai), 1.0);
    }

    #[tokio::test]
    async fn test_holdings_failure_aborts() {
        let providers: Vec<Box<dyn QuoteProvider>> = Vec::new();
        let err = fetch_market_data(&FailingHoldings, &providers, &StrategyCatalog::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("rpc down"));
    }
}

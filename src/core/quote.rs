//! Yield quote abstractions and core types

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// An external source of yield quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Llama,
    Lending,
    Vault,
}

impl Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Venue::Llama => "llama",
                Venue::Lending => "lending",
                Venue::Vault => "vault",
            }
        )
    }
}

impl FromStr for Venue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llama" => Ok(Venue::Llama),
            "lending" => Ok(Venue::Lending),
            "vault" => Ok(Venue::Vault),
            _ => Err(anyhow!("Invalid venue: {}", s)),
        }
    }
}

/// Identifies the quote used for a strategy/asset pairing, written
/// `venue:market` (e.g. `lending:USDC`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VenueQuoteKey {
    pub venue: Venue,
    pub market: String,
}

impl VenueQuoteKey {
    pub fn new(venue: Venue, market: &str) -> Self {
        Self {
            venue,
            market: market.to_string(),
        }
    }
}

impl Display for VenueQuoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.venue, self.market)
    }
}

impl FromStr for VenueQuoteKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (venue, market) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid quote key '{}', expected venue:market", s))?;
        if market.trim().is_empty() {
            return Err(anyhow!("Invalid quote key '{}', market is empty", s));
        }
        Ok(Self::new(venue.trim().parse()?, market.trim()))
    }
}

impl TryFrom<String> for VenueQuoteKey {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VenueQuoteKey> for String {
    fn from(key: VenueQuoteKey) -> Self {
        key.to_string()
    }
}

/// Annualized rates, as fractions (0.05 is 5%).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct YieldQuote {
    pub base: f64,
    pub reward: f64,
}

impl YieldQuote {
    pub fn new(base: f64, reward: f64) -> Self {
        Self { base, reward }
    }

    /// Base plus reward, before any boost.
    pub fn combined(&self) -> f64 {
        self.base + self.reward
    }
}

/// Normalized quotes for one projection cycle.
pub type QuoteSet = BTreeMap<VenueQuoteKey, YieldQuote>;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn venue(&self) -> Venue;

    /// Fetches quotes for the given markets. Markets the venue does not
    /// report are absent from the result.
    async fn fetch_quotes(&self, markets: &[String]) -> Result<QuoteSet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_key_parse() {
        let key: VenueQuoteKey = "lending:USDC".parse().unwrap();
        assert_eq!(key.venue, Venue::Lending);
        assert_eq!(key.market, "USDC");
        assert_eq!(key.to_string(), "lending:USDC");

        let key: VenueQuoteKey = "llama:aa70268e-4b52-42bf-a116-608b370f9501".parse().unwrap();
        assert_eq!(key.venue, Venue::Llama);
        assert_eq!(key.market, "aa70268e-4b52-42bf-a116-608b370f9501");
    }

    #[test]
    fn test_quote_key_parse_errors() {
        assert!("lending".parse::<VenueQuoteKey>().is_err());
        assert!("lending:".parse::<VenueQuoteKey>().is_err());
        assert!("dex:USDC".parse::<VenueQuoteKey>().is_err());
    }

    #[test]
    fn test_combined_rate() {
        let quote = YieldQuote::new(0.04, 0.01);
        assert!((quote.combined() - 0.05).abs() < 1e-12);
    }
}

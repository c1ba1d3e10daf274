pub mod lending;
pub mod llama;
pub mod reserve;
pub mod util;
pub mod vault;

use crate::core::config::{AppConfig, HoldingsConfig};
use crate::core::{HoldingsProvider, QuoteProvider, holdings::StaticHoldings};
use anyhow::{Result, bail};

/// Builds the quote providers for every venue configured.
pub fn quote_providers(config: &AppConfig) -> Vec<Box<dyn QuoteProvider>> {
    let mut providers: Vec<Box<dyn QuoteProvider>> = Vec::new();
    if let Some(p) = &config.providers.llama {
        providers.push(Box::new(llama::LlamaProvider::new(&p.base_url)));
    }
    if let Some(p) = &config.providers.lending {
        providers.push(Box::new(lending::LendingProvider::new(&p.base_url)));
    }
    if let Some(p) = &config.providers.vault {
        providers.push(Box::new(vault::VaultProvider::new(&p.base_url)));
    }
    providers
}

/// Builds the holdings source named in the config.
pub fn holdings_provider(holdings: &HoldingsConfig) -> Result<Box<dyn HoldingsProvider>> {
    match (&holdings.api, &holdings.fixed) {
        (Some(api), None) => Ok(Box::new(reserve::ReserveApiProvider::new(&api.base_url))),
        (None, Some(fixed)) => Ok(Box::new(StaticHoldings::new(fixed.clone()))),
        _ => bail!("holdings: exactly one of `api` or `static` must be set"),
    }
}

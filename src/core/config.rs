use super::asset::Asset;
use super::catalog::{Scope, Strategy, StrategyCatalog};
use super::holdings::HoldingsSnapshot;
use super::quote::VenueQuoteKey;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
}

/// Where holdings come from. Exactly one source must be set.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HoldingsConfig {
    pub api: Option<ProviderConfig>,
    #[serde(rename = "static")]
    pub fixed: Option<HoldingsSnapshot>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub llama: Option<ProviderConfig>,
    pub lending: Option<ProviderConfig>,
    pub vault: Option<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            llama: Some(ProviderConfig {
                base_url: "https://yields.llama.fi".to_string(),
            }),
            lending: None,
            vault: None,
        }
    }
}

/// A catalog entry as written in the config file. `quote` applies to every
/// asset without an entry in `quotes`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StrategyConfig {
    pub id: String,
    pub name: Option<String>,
    pub assets: Vec<Asset>,
    pub quote: Option<VenueQuoteKey>,
    #[serde(default)]
    pub quotes: BTreeMap<Asset, VenueQuoteKey>,
}

impl StrategyConfig {
    fn to_strategy(&self) -> Strategy {
        let scope = match self.assets.as_slice() {
            [single] => Scope::Single(*single),
            assets => Scope::Basket(assets.to_vec()),
        };
        let mut quotes = self.quotes.clone();
        if let Some(shared) = &self.quote {
            for asset in &self.assets {
                quotes.entry(*asset).or_insert_with(|| shared.clone());
            }
        }
        Strategy {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            scope,
            quotes,
        }
    }
}

fn default_boost() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_boost")]
    pub boost: f64,
    pub holdings: HoldingsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Replaces the built-in catalog when present.
    pub strategies: Option<Vec<StrategyConfig>>,
    /// Manual allocation overrides, applied after seeding from holdings.
    #[serde(default)]
    pub allocations: BTreeMap<Asset, BTreeMap<String, f64>>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "yieldsim", "yieldsim")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config = Self::from_yaml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match (&self.holdings.api, &self.holdings.fixed) {
            (Some(_), Some(_)) => bail!("holdings: set either `api` or `static`, not both"),
            (None, None) => bail!("holdings: one of `api` or `static` is required"),
            (None, Some(fixed)) => fixed
                .check_amounts()
                .context("Invalid static holdings")?,
            (Some(_), None) => {}
        }
        self.catalog().context("Invalid strategy catalog")?;
        Ok(())
    }

    /// The configured catalog, or the built-in one.
    pub fn catalog(&self) -> Result<StrategyCatalog> {
        match &self.strategies {
            Some(entries) => {
                StrategyCatalog::new(entries.iter().map(|e| e.to_strategy()).collect())
            }
            None => Ok(StrategyCatalog::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::quote::Venue;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
boost: 1.5
holdings:
  static:
    aave-v3:
      USDC: 1000.0
      USDT: 500.0
    sdai:
      DAI: 250.0
providers:
  lending:
    base_url: "http://example.com/lending"
  vault:
    base_url: "http://example.com/vault"
allocations:
  USDC:
    aave-v3: 0.6
"#;

        let config = AppConfig::from_yaml(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.boost, 1.5);
        let holdings = config.holdings.fixed.as_ref().unwrap();
        assert_eq!(holdings.amount("aave-v3", Asset::Usdt), 500.0);
        assert_eq!(holdings.amount("sdai", Asset::Dai), 250.0);
        assert!(config.holdings.api.is_none());

        // Providers block replaces the defaults entirely.
        assert!(config.providers.llama.is_none());
        assert_eq!(
            config.providers.lending.as_ref().unwrap().base_url,
            "http://example.com/lending"
        );
        assert_eq!(config.allocations[&Asset::Usdc]["aave-v3"], 0.6);
        assert_eq!(config.catalog().unwrap(), StrategyCatalog::default());
    }

    #[test]
    fn test_config_defaults() {
        let yaml_str = r#"
holdings:
  api:
    base_url: "http://example.com/reserve"
"#;
        let config = AppConfig::from_yaml(yaml_str).unwrap();
        assert_eq!(config.boost, 1.0);
        assert!(config.allocations.is_empty());
        assert_eq!(
            config.providers.llama.unwrap().base_url,
            "https://yields.llama.fi"
        );
    }

    #[test]
    fn test_config_custom_strategies() {
        let yaml_str = r#"
holdings:
  static: {}
strategies:
  - id: pool
    name: "Stable Pool"
    assets: [USDC, USDT]
    quote: "llama:pool-1"
  - id: lend
    assets: [DAI, USDC]
    quote: "lending:DAI"
    quotes:
      USDC: "lending:USDC"
  - id: vault
    assets: [USDT]
    quotes:
      USDT: "vault:usdt-vault"
"#;
        let config = AppConfig::from_yaml(yaml_str).unwrap();
        let catalog = config.catalog().unwrap();
        let ids: Vec<_> = catalog.strategies().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["pool", "lend", "vault"]);

        let pool = catalog.get("pool").unwrap();
        assert_eq!(pool.scope, Scope::Basket(vec![Asset::Usdc, Asset::Usdt]));
        assert_eq!(pool.quote_groups().len(), 1);

        let lend = catalog.get("lend").unwrap();
        assert_eq!(lend.name, "lend");
        assert_eq!(
            lend.quote_key(Asset::Usdc),
            Some(&VenueQuoteKey::new(Venue::Lending, "USDC"))
        );
        assert_eq!(
            lend.quote_key(Asset::Dai),
            Some(&VenueQuoteKey::new(Venue::Lending, "DAI"))
        );

        assert_eq!(catalog.get("vault").unwrap().scope, Scope::Single(Asset::Usdt));
    }

    #[test]
    fn test_config_rejects_invalid_input() {
        let both = r#"
holdings:
  api: { base_url: "http://x" }
  static: {}
"#;
        assert!(AppConfig::from_yaml(both).is_err());

        let neither = "holdings: {}\n";
        assert!(AppConfig::from_yaml(neither).is_err());

        let missing_key = r#"
holdings:
  static: {}
strategies:
  - id: pool
    assets: [USDC, DAI]
    quotes:
      USDC: "lending:USDC"
"#;
        let err = AppConfig::from_yaml(missing_key).unwrap_err();
        assert!(format!("{err:#}").contains("no quote key for DAI"));

        let negative = r#"
holdings:
  static:
    aave-v3:
      USDC: -500
    morpho-usdc:
      USDC: 100
"#;
        let err = AppConfig::from_yaml(negative).unwrap_err();
        assert!(format!("{err:#}").contains("Negative USDC balance -500 for strategy aave-v3"));

        let infinite = r#"
holdings:
  static:
    sdai:
      DAI: .inf
"#;
        assert!(AppConfig::from_yaml(infinite).is_err());

        let bad_asset = r#"
holdings:
  static:
    aave-v3:
      BUSD: 1.0
"#;
        assert!(AppConfig::from_yaml(bad_asset).is_err());
    }

    #[test]
    fn test_load_from_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "holdings:\n  static:\n    sdai:\n      DAI: 10\n").unwrap();
        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.holdings.fixed.unwrap().amount("sdai", Asset::Dai), 10.0);

        let err = AppConfig::load_from_path("/nonexistent/yieldsim.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}

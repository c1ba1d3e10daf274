//! Reserve assets

use super::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// A stable-value unit the reserve can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Asset {
    Usdc,
    Usdt,
    Dai,
}

impl Asset {
    /// Every asset, in the order used for aggregation and display.
    pub const ALL: [Asset; 3] = [Asset::Usdc, Asset::Usdt, Asset::Dai];

    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
            Asset::Dai => "DAI",
        }
    }
}

impl Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Asset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USDC" => Ok(Asset::Usdc),
            "USDT" => Ok(Asset::Usdt),
            "DAI" => Ok(Asset::Dai),
            _ => Err(CoreError::unknown_asset(s)),
        }
    }
}

impl TryFrom<String> for Asset {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.symbol().to_string()
    }
}

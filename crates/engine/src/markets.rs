use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Top-level markets config file (TOML).
///
/// Example `config/markets.toml`:
/// ```toml
/// [[market]]
/// slug = "ETH/USDT"
/// symbol = "ETHUSDT"
/// leverage = 10
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketFileConfig {
    #[serde(rename = "market")]
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Market {
    /// Human-readable market name shown to the agent, e.g. "ETH/USDT".
    pub slug: String,
    /// Exchange symbol, e.g. "ETHUSDT".
    pub symbol: String,
    /// Maximum leverage the agent is told it may use.
    #[serde(default = "default_leverage")]
    pub leverage: u32,
}

fn default_leverage() -> u32 {
    1
}

impl MarketFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read markets config at '{path}': {e}")))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("failed to parse markets config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if cfg.markets.is_empty() {
            return Err(Error::Config("at least one [[market]] is required".into()));
        }
        Ok(cfg)
    }
}

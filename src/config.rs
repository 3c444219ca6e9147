use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub use_json: bool,
    pub ledger: LedgerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            use_json: false,
            ledger: LedgerConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Upper bound for a single store round trip.
    pub store_timeout_ms: u64,
    /// Balance credited to accounts registered without an explicit opening balance.
    pub initial_balance: Decimal,
    pub description_max_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 5_000,
            initial_balance: Decimal::from(1000),
            description_max_len: 50,
        }
    }
}

impl LedgerConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file `{}`", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse `{}`", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

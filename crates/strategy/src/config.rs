use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{DateTimeInterval, Pair, RawConfig, Result, StrategyRun, StrategyRunMarket};

/// Top-level runs file (TOML).
///
/// Example `config/runs.toml`:
/// ```toml
/// [[run]]
/// pair = "USD_BTC"
/// strategy = "double_crossover"
/// candle_storage = "memory"
/// order_storage = "memory"
/// since = "2024-01-01T00:00:00Z"
/// till = "2024-01-02T00:00:00Z"
///
/// [run.strategy_configuration]
/// long_average_interval = "1h"
/// short_average_interval = "15m"
///
/// [[run.market]]
/// name = "bittrex"
/// plugin = "paper"
///
/// [run.market.configuration]
/// initial_balance = 1000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunFileConfig {
    #[serde(rename = "run", default)]
    pub runs: Vec<RunConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    pub pair: Pair,
    /// Strategy registry name, e.g. "double_crossover".
    pub strategy: String,
    #[serde(default)]
    pub strategy_configuration: BTreeMap<String, toml::Value>,
    #[serde(rename = "market", default)]
    pub markets: Vec<MarketConfig>,
    pub candle_storage: String,
    pub order_storage: String,
    /// Replay window; ignored by live runs.
    pub since: Option<DateTime<Utc>>,
    pub till: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
    pub name: String,
    pub plugin: String,
    #[serde(default)]
    pub configuration: BTreeMap<String, toml::Value>,
}

impl RunFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl RunConfig {
    /// Freeze this entry into a run descriptor.
    pub fn to_strategy_run(&self, id: Uuid, run_at: DateTime<Utc>) -> Result<StrategyRun> {
        Ok(StrategyRun {
            id,
            run_at,
            pair: self.pair.clone(),
            markets: self
                .markets
                .iter()
                .map(|m| StrategyRunMarket {
                    market_name: m.name.clone(),
                    plugin_name: m.plugin.clone(),
                    configuration: stringify(&m.configuration),
                })
                .collect(),
            strategy_name: self.strategy.clone(),
            strategy_configuration: stringify(&self.strategy_configuration),
            interval: DateTimeInterval::new(self.since, self.till)?,
            candle_storage_name: self.candle_storage.clone(),
            order_storage_name: self.order_storage.clone(),
        })
    }
}

/// Flatten TOML scalars to the raw strings configuration schemas coerce.
fn stringify(values: &BTreeMap<String, toml::Value>) -> RawConfig {
    values
        .iter()
        .map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DateTimeInterval, Pair};

/// Raw `key -> value` configuration as written by an operator, before a
/// schema coerces it into typed values.
pub type RawConfig = BTreeMap<String, String>;

/// A market bound to a run: the name orders are recorded under and the
/// plugin (with its configuration) that implements it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRunMarket {
    pub market_name: String,
    pub plugin_name: String,
    #[serde(default)]
    pub configuration: RawConfig,
}

/// Recorded descriptor of one strategy execution.
///
/// Persisted before the first tick so every live run and every replay can be
/// audited and reproduced. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRun {
    pub id: Uuid,
    pub run_at: DateTime<Utc>,
    pub pair: Pair,
    pub markets: Vec<StrategyRunMarket>,
    pub strategy_name: String,
    #[serde(default)]
    pub strategy_configuration: RawConfig,
    /// Replay window. Live runs leave both bounds empty.
    #[serde(default)]
    pub interval: DateTimeInterval,
    pub candle_storage_name: String,
    pub order_storage_name: String,
}

/// Balances of a market captured right before an order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: Uuid,
    pub order_id: Uuid,
    pub strategy_run_id: Uuid,
    pub market_name: String,
    pub balances: BTreeMap<String, Decimal>,
    pub taken_at: DateTime<Utc>,
}

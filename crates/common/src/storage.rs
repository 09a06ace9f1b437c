use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    Candle, CandleField, CandleSize, DateTimeInterval, Error, Order, OrderDirection, OrderStatus, Pair,
    PortfolioSnapshot, Result, StrategyRun,
};

/// Time-series store of OHLC candles.
///
/// Writes are idempotent per (market, pair, size, time): writing a bucket a
/// second time replaces it.
#[async_trait]
pub trait CandleStorage: Send + Sync {
    async fn write_candle(&self, candle: &Candle) -> Result<()> {
        self.write_candles(std::slice::from_ref(candle)).await
    }

    async fn write_candles(&self, candles: &[Candle]) -> Result<()>;

    /// Candles with time strictly inside `interval`, oldest first.
    async fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        interval: &DateTimeInterval,
        candle_size: CandleSize,
    ) -> Result<Vec<Candle>>;

    /// Arithmetic mean of `field` over the candles strictly inside `interval`.
    ///
    /// An empty interval is an error, never zero: a phantom zero average would
    /// read as a real crossover to a strategy.
    async fn mean(
        &self,
        market_name: &str,
        pair: &Pair,
        field: CandleField,
        interval: &DateTimeInterval,
        candle_size: CandleSize,
    ) -> Result<Decimal> {
        let candles = self.find_by(market_name, pair, interval, candle_size).await?;
        if candles.is_empty() {
            return Err(Error::NoCandlesForMarketInStorage {
                market: market_name.to_string(),
                pair: pair.clone(),
            });
        }
        let sum: Decimal = candles.iter().map(|c| c.field(field)).sum();
        Ok(sum / Decimal::from(candles.len()))
    }

    /// The latest candle whose bucket starts at or before `now`.
    async fn get_current_candle(
        &self,
        market_name: &str,
        pair: &Pair,
        candle_size: CandleSize,
        now: DateTime<Utc>,
    ) -> Result<Candle>;
}

/// Optional, conjunctive filters for [`OrderStorage::find_by`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub direction: Option<OrderDirection>,
    /// Matched against `created_at`.
    pub interval: Option<DateTimeInterval>,
    pub strategy_run_id: Option<Uuid>,
}

impl OrderFilter {
    pub fn open() -> Self {
        Self {
            status: Some(OrderStatus::Open),
            ..Self::default()
        }
    }

    /// Open orders placed by one strategy run.
    pub fn open_for_run(strategy_run_id: Uuid) -> Self {
        Self {
            strategy_run_id: Some(strategy_run_id),
            ..Self::open()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status() == s)
            && self.direction.map_or(true, |d| order.direction() == d)
            && self.interval.map_or(true, |i| i.contains(order.created_at()))
            && self.strategy_run_id.map_or(true, |id| order.strategy_run_id() == id)
    }
}

#[async_trait]
pub trait OrderStorage: Send + Sync {
    /// Insert or replace, keyed by order id.
    async fn save_order(&self, order: &Order) -> Result<()>;

    /// Orders of `pair` on `market_name` matching `filter`, oldest first.
    async fn find_by(&self, market_name: &str, pair: &Pair, filter: &OrderFilter) -> Result<Vec<Order>>;

    async fn find_last_order(&self, market_name: &str, pair: &Pair) -> Result<Option<Order>>;

    async fn delete(&self, order_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait StrategyRunStorage: Send + Sync {
    async fn save_strategy_run(&self, run: &StrategyRun) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StrategyRun>>;

    /// Every recorded run, most recent `run_at` first.
    async fn find_all(&self) -> Result<Vec<StrategyRun>>;
}

#[async_trait]
pub trait PortfolioSnapshotStorage: Send + Sync {
    async fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<()>;

    async fn find_by_strategy_run(&self, strategy_run_id: Uuid) -> Result<Vec<PortfolioSnapshot>>;
}

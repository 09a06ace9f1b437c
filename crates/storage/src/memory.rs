use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use common::{
    Candle, CandleSize, CandleStorage, DateTimeInterval, Error, Order, OrderFilter, OrderStorage, Pair,
    PortfolioSnapshot, PortfolioSnapshotStorage, Result, StrategyRun, StrategyRunStorage,
};

/// (market, pair, size, bucket start). Ordering keeps each series time-sorted.
type CandleKey = (String, Pair, CandleSize, DateTime<Utc>);

/// Process-local storage for every storage contract.
///
/// Used by replays and tests; safe to share between concurrently running
/// strategies.
#[derive(Default)]
pub struct MemoryStorage {
    candles: RwLock<BTreeMap<CandleKey, Candle>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    runs: RwLock<HashMap<Uuid, StrategyRun>>,
    snapshots: RwLock<Vec<PortfolioSnapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn candle_count(&self) -> usize {
        self.candles.read().await.len()
    }
}

fn series_bounds(
    market_name: &str,
    pair: &Pair,
    candle_size: CandleSize,
    till: DateTime<Utc>,
) -> (CandleKey, CandleKey) {
    (
        (market_name.to_string(), pair.clone(), candle_size, DateTime::<Utc>::MIN_UTC),
        (market_name.to_string(), pair.clone(), candle_size, till),
    )
}

#[async_trait]
impl CandleStorage for MemoryStorage {
    async fn write_candles(&self, candles: &[Candle]) -> Result<()> {
        let mut stored = self.candles.write().await;
        for candle in candles {
            let key = (
                candle.market_name().to_string(),
                candle.pair().clone(),
                candle.candle_size(),
                candle.time(),
            );
            stored.insert(key, candle.clone());
        }
        Ok(())
    }

    async fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        interval: &DateTimeInterval,
        candle_size: CandleSize,
    ) -> Result<Vec<Candle>> {
        let stored = self.candles.read().await;
        let (from, to) = series_bounds(market_name, pair, candle_size, DateTime::<Utc>::MAX_UTC);
        Ok(stored
            .range(from..=to)
            .map(|(_, candle)| candle)
            .filter(|candle| interval.contains(candle.time()))
            .cloned()
            .collect())
    }

    async fn get_current_candle(
        &self,
        market_name: &str,
        pair: &Pair,
        candle_size: CandleSize,
        now: DateTime<Utc>,
    ) -> Result<Candle> {
        let stored = self.candles.read().await;
        let (from, to) = series_bounds(market_name, pair, candle_size, now);
        stored
            .range(from..=to)
            .next_back()
            .map(|(_, candle)| candle.clone())
            .ok_or_else(|| Error::NoCandlesForMarketInStorage {
                market: market_name.to_string(),
                pair: pair.clone(),
            })
    }
}

#[async_trait]
impl OrderStorage for MemoryStorage {
    async fn save_order(&self, order: &Order) -> Result<()> {
        self.orders.write().await.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find_by(&self, market_name: &str, pair: &Pair, filter: &OrderFilter) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.market_name() == market_name && o.pair() == pair && filter.matches(o))
            .cloned()
            .collect();
        found.sort_by_key(|o| (o.created_at(), o.id()));
        Ok(found)
    }

    async fn find_last_order(&self, market_name: &str, pair: &Pair) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.market_name() == market_name && o.pair() == pair)
            .max_by_key(|o| (o.created_at(), o.id()))
            .cloned())
    }

    async fn delete(&self, order_id: Uuid) -> Result<()> {
        self.orders.write().await.remove(&order_id);
        Ok(())
    }
}

#[async_trait]
impl StrategyRunStorage for MemoryStorage {
    async fn save_strategy_run(&self, run: &StrategyRun) -> Result<()> {
        self.runs.write().await.insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StrategyRun>> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<StrategyRun>> {
        let mut runs: Vec<StrategyRun> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.run_at.cmp(&a.run_at).then(a.id.cmp(&b.id)));
        Ok(runs)
    }
}

#[async_trait]
impl PortfolioSnapshotStorage for MemoryStorage {
    async fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        self.snapshots.write().await.push(snapshot.clone());
        Ok(())
    }

    async fn find_by_strategy_run(&self, strategy_run_id: Uuid) -> Result<Vec<PortfolioSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.strategy_run_id == strategy_run_id)
            .cloned()
            .collect())
    }
}

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use common::{
    Candle, CandleSize, CandleStorage, DateTimeInterval, Error, Order, OrderDirection, OrderFilter,
    OrderRecord, OrderStatus, OrderStorage, OrderType, Pair, PortfolioSnapshot, PortfolioSnapshotStorage,
    Result, StrategyRun, StrategyRunStorage,
};

/// SQLite-backed storage for candles, orders, runs and snapshots.
///
/// Decimals are stored as TEXT so no precision is lost; times as unix
/// microseconds so range predicates compare numerically.
#[derive(Clone)]
pub struct SqliteStorage {
    db: SqlitePool,
}

impl SqliteStorage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = SqlitePool::connect(database_url).await?;
        let storage = Self { db };
        storage.migrate().await?;
        info!(url = %database_url, "SQLite storage ready");
        Ok(storage)
    }

    /// Private in-memory database. A single long-lived connection keeps the
    /// schema alive for the life of the pool.
    pub async fn in_memory() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let storage = Self { db };
        storage.migrate().await?;
        Ok(storage)
    }

    pub fn from_pool(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.db)
            .await
            .map_err(|e| Error::Database(e.into()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

// ─── Column codecs ───────────────────────────────────────────────────────────

fn to_micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

fn from_micros(v: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(v.div_euclid(1_000_000), (v.rem_euclid(1_000_000) * 1_000) as u32)
        .ok_or_else(|| Error::Other(format!("timestamp out of range: {v}")))
}

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let text: String = row.try_get(column)?;
    Decimal::from_str(&text).map_err(|e| Error::Other(format!("column {column}: '{text}' is not a decimal: {e}")))
}

fn uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let text: String = row.try_get(column)?;
    Uuid::parse_str(&text).map_err(|e| Error::Other(format!("column {column}: '{text}' is not a uuid: {e}")))
}

fn bounds(interval: &DateTimeInterval) -> (Option<i64>, Option<i64>) {
    (interval.since.map(to_micros), interval.till.map(to_micros))
}

fn candle_from_row(row: &SqliteRow) -> Result<Candle> {
    let market_name: String = row.try_get("market_name")?;
    let pair: String = row.try_get("pair")?;
    let candle_size: String = row.try_get("candle_size")?;
    Candle::new(
        market_name,
        Pair::from_str(&pair)?,
        from_micros(row.try_get("time")?)?,
        decimal(row, "open")?,
        decimal(row, "high")?,
        decimal(row, "low")?,
        decimal(row, "close")?,
        CandleSize::from_str(&candle_size)?,
    )
}

fn order_from_row(row: &SqliteRow) -> Result<Order> {
    let pair: String = row.try_get("pair")?;
    let rate: Option<String> = row.try_get("rate")?;
    let closed_at: Option<i64> = row.try_get("closed_at")?;
    let canceled_at: Option<i64> = row.try_get("canceled_at")?;
    let record = OrderRecord {
        id: uuid(row, "id")?,
        strategy_run_id: uuid(row, "strategy_run_id")?,
        market_name: row.try_get("market_name")?,
        direction: row.try_get::<OrderDirection, _>("direction")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        pair: Pair::from_str(&pair)?,
        order_type: row.try_get::<OrderType, _>("order_type")?,
        quantity: decimal(row, "quantity")?,
        rate: rate
            .map(|r| Decimal::from_str(&r).map_err(|e| Error::Other(format!("bad rate '{r}': {e}"))))
            .transpose()?,
        id_on_market: row.try_get("id_on_market")?,
        status: row.try_get::<OrderStatus, _>("status")?,
        closed_at: closed_at.map(from_micros).transpose()?,
        canceled_at: canceled_at.map(from_micros).transpose()?,
    };
    Order::try_from(record)
}

// ─── Candles ─────────────────────────────────────────────────────────────────

#[async_trait]
impl CandleStorage for SqliteStorage {
    async fn write_candles(&self, candles: &[Candle]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for candle in candles {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO candles (market_name, pair, candle_size, time, open, high, low, close)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(candle.market_name())
            .bind(candle.pair().to_string())
            .bind(candle.candle_size().to_string())
            .bind(to_micros(candle.time()))
            .bind(candle.open().to_string())
            .bind(candle.high().to_string())
            .bind(candle.low().to_string())
            .bind(candle.close().to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(count = candles.len(), "Candles written");
        Ok(())
    }

    async fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        interval: &DateTimeInterval,
        candle_size: CandleSize,
    ) -> Result<Vec<Candle>> {
        let (since, till) = bounds(interval);
        let rows = sqlx::query(
            r#"
            SELECT * FROM candles
            WHERE market_name = ?1 AND pair = ?2 AND candle_size = ?3
              AND (?4 IS NULL OR time > ?4)
              AND (?5 IS NULL OR time < ?5)
            ORDER BY time ASC
            "#,
        )
        .bind(market_name)
        .bind(pair.to_string())
        .bind(candle_size.to_string())
        .bind(since)
        .bind(till)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(candle_from_row).collect()
    }

    async fn get_current_candle(
        &self,
        market_name: &str,
        pair: &Pair,
        candle_size: CandleSize,
        now: DateTime<Utc>,
    ) -> Result<Candle> {
        let row = sqlx::query(
            r#"
            SELECT * FROM candles
            WHERE market_name = ?1 AND pair = ?2 AND candle_size = ?3 AND time <= ?4
            ORDER BY time DESC
            LIMIT 1
            "#,
        )
        .bind(market_name)
        .bind(pair.to_string())
        .bind(candle_size.to_string())
        .bind(to_micros(now))
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => candle_from_row(&row),
            None => Err(Error::NoCandlesForMarketInStorage {
                market: market_name.to_string(),
                pair: pair.clone(),
            }),
        }
    }
}

// ─── Orders ──────────────────────────────────────────────────────────────────

#[async_trait]
impl OrderStorage for SqliteStorage {
    async fn save_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO orders
                (id, strategy_run_id, market_name, direction, created_at, pair, order_type,
                 quantity, rate, id_on_market, status, closed_at, canceled_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(order.id().to_string())
        .bind(order.strategy_run_id().to_string())
        .bind(order.market_name())
        .bind(order.direction())
        .bind(to_micros(order.created_at()))
        .bind(order.pair().to_string())
        .bind(order.order_type())
        .bind(order.quantity().to_string())
        .bind(order.rate().map(|r| r.to_string()))
        .bind(order.id_on_market())
        .bind(order.status())
        .bind(order.closed_at().map(to_micros))
        .bind(order.canceled_at().map(to_micros))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by(&self, market_name: &str, pair: &Pair, filter: &OrderFilter) -> Result<Vec<Order>> {
        let (since, till) = filter.interval.as_ref().map_or((None, None), bounds);
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE market_name = ?1 AND pair = ?2
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR direction = ?4)
              AND (?5 IS NULL OR created_at > ?5)
              AND (?6 IS NULL OR created_at < ?6)
              AND (?7 IS NULL OR strategy_run_id = ?7)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(market_name)
        .bind(pair.to_string())
        .bind(filter.status)
        .bind(filter.direction)
        .bind(since)
        .bind(till)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn find_last_order(&self, market_name: &str, pair: &Pair) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE market_name = ?1 AND pair = ?2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(market_name)
        .bind(pair.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn delete(&self, order_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(order_id.to_string())
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

// ─── Strategy runs ───────────────────────────────────────────────────────────

#[async_trait]
impl StrategyRunStorage for SqliteStorage {
    async fn save_strategy_run(&self, run: &StrategyRun) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO strategy_runs (id, run_at, body) VALUES (?1, ?2, ?3)")
            .bind(run.id.to_string())
            .bind(to_micros(run.run_at))
            .bind(serde_json::to_string(run)?)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StrategyRun>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM strategy_runs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.db)
            .await?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    async fn find_all(&self) -> Result<Vec<StrategyRun>> {
        let bodies: Vec<String> = sqlx::query_scalar("SELECT body FROM strategy_runs ORDER BY run_at DESC, id ASC")
            .fetch_all(&self.db)
            .await?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(Error::from))
            .collect()
    }
}

// ─── Portfolio snapshots ─────────────────────────────────────────────────────

#[async_trait]
impl PortfolioSnapshotStorage for SqliteStorage {
    async fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO portfolio_snapshots (id, strategy_run_id, taken_at, body)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(snapshot.id.to_string())
        .bind(snapshot.strategy_run_id.to_string())
        .bind(to_micros(snapshot.taken_at))
        .bind(serde_json::to_string(snapshot)?)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_strategy_run(&self, strategy_run_id: Uuid) -> Result<Vec<PortfolioSnapshot>> {
        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT body FROM portfolio_snapshots WHERE strategy_run_id = ?1 ORDER BY taken_at ASC, id ASC",
        )
        .bind(strategy_run_id.to_string())
        .fetch_all(&self.db)
        .await?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use common::CandleField;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn candle_writes_are_idempotent() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.write_candle(&candle(minute(1), dec!(100.5))).await.unwrap();
        storage.write_candle(&candle(minute(1), dec!(101.25))).await.unwrap();

        let found = CandleStorage::find_by(&storage, MARKET, &pair(), &DateTimeInterval::unbounded(), CandleSize::ONE_MINUTE)
            .await
            .unwrap();
        assert_eq!(found, vec![candle(minute(1), dec!(101.25))]);
    }

    #[tokio::test]
    async fn candle_interval_bounds_are_exclusive() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage
            .write_candles(&[candle(minute(1), dec!(1)), candle(minute(2), dec!(2)), candle(minute(3), dec!(3))])
            .await
            .unwrap();

        let interval = DateTimeInterval::between(minute(1), minute(3)).unwrap();
        let mean = storage
            .mean(MARKET, &pair(), CandleField::Close, &interval, CandleSize::ONE_MINUTE)
            .await
            .unwrap();
        assert_eq!(mean, dec!(2));

        let current = storage
            .get_current_candle(MARKET, &pair(), CandleSize::ONE_MINUTE, minute(2))
            .await
            .unwrap();
        assert_eq!(current.time(), minute(2));
    }

    #[tokio::test]
    async fn other_candle_sizes_are_separate_series() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.write_candle(&candle(minute(0), dec!(1))).await.unwrap();

        let hourly = CandleStorage::find_by(&storage, MARKET, &pair(), &DateTimeInterval::unbounded(), CandleSize::ONE_HOUR)
            .await
            .unwrap();
        assert!(hourly.is_empty());
    }

    #[tokio::test]
    async fn orders_round_trip_through_the_table() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let mut order = order(1, minute(1), OrderDirection::Buy);
        order.set_id_on_market("paper-1");
        storage.save_order(&order).await.unwrap();

        let open = OrderStorage::find_by(&storage, MARKET, &pair(), &OrderFilter::open()).await.unwrap();
        assert_eq!(open, vec![order.clone()]);

        order.close(minute(2)).unwrap();
        storage.save_order(&order).await.unwrap();
        assert!(OrderStorage::find_by(&storage, MARKET, &pair(), &OrderFilter::open()).await.unwrap().is_empty());

        let last = storage.find_last_order(MARKET, &pair()).await.unwrap();
        assert_eq!(last, Some(order.clone()));

        storage.delete(order.id()).await.unwrap();
        assert_eq!(storage.find_last_order(MARKET, &pair()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn order_direction_filter() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.save_order(&order(1, minute(1), OrderDirection::Buy)).await.unwrap();
        storage.save_order(&order(2, minute(2), OrderDirection::Sell)).await.unwrap();

        let sells = OrderFilter {
            direction: Some(OrderDirection::Sell),
            ..OrderFilter::default()
        };
        let found = OrderStorage::find_by(&storage, MARKET, &pair(), &sells).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].direction(), OrderDirection::Sell);
    }

    #[tokio::test]
    async fn run_filter_only_returns_that_runs_orders() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let other_run = Uuid::from_u128(7);
        storage.save_order(&order(1, minute(1), OrderDirection::Buy)).await.unwrap();
        storage.save_order(&order_of_run(other_run, 2, minute(2), OrderDirection::Buy)).await.unwrap();

        let found = OrderStorage::find_by(&storage, MARKET, &pair(), &OrderFilter::open_for_run(other_run))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), Uuid::from_u128(2));
        assert_eq!(OrderStorage::find_by(&storage, MARKET, &pair(), &OrderFilter::open()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn runs_and_snapshots_persist_as_documents() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let run = strategy_run();
        storage.save_strategy_run(&run).await.unwrap();
        assert_eq!(storage.find_by_id(run.id).await.unwrap(), Some(run.clone()));
        assert_eq!(storage.find_all().await.unwrap(), vec![run.clone()]);

        let snap = snapshot(run.id);
        storage.save_snapshot(&snap).await.unwrap();
        assert_eq!(storage.find_by_strategy_run(run.id).await.unwrap(), vec![snap]);
    }
}

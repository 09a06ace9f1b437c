use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use common::{
    CandleField, CandleSize, CandleStorage, Clock, ConfigField, ConfigSchema, DateTimeInterval, Error,
    FieldKind, Market, Pair, RawConfig, Result,
};

use crate::orders::OrderLifecycle;
use crate::signal::CrossoverTracker;
use crate::Strategy;

pub const NAME: &str = "double_crossover";

pub const SCHEMA: ConfigSchema = ConfigSchema::new(
    NAME,
    &[
        ConfigField { key: "long_average_interval", kind: FieldKind::Duration, title: "Long moving average window", default: None },
        ConfigField { key: "short_average_interval", kind: FieldKind::Duration, title: "Short moving average window", default: None },
        ConfigField { key: "candle_size", kind: FieldKind::CandleSize, title: "Candle size to average", default: Some("1m") },
    ],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleCrossoverConfig {
    pub long_average_interval: Duration,
    pub short_average_interval: Duration,
    pub candle_size: CandleSize,
}

impl DoubleCrossoverConfig {
    pub fn from_raw(raw: &RawConfig) -> Result<Self> {
        let typed = SCHEMA
            .coerce(raw)
            .map_err(|e| Error::StrategyConfiguration(e.to_string()))?;
        let config = Self {
            long_average_interval: typed.duration("long_average_interval")?,
            short_average_interval: typed.duration("short_average_interval")?,
            candle_size: typed.candle_size("candle_size")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_average_interval >= self.long_average_interval {
            return Err(Error::StrategyConfiguration(format!(
                "short_average_interval ({}s) must be shorter than long_average_interval ({}s)",
                self.short_average_interval.num_seconds(),
                self.long_average_interval.num_seconds()
            )));
        }
        Ok(())
    }
}

fn window_start(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(window).ok_or_else(|| {
        Error::StrategyConfiguration(format!(
            "averaging window of {}s reaches before the earliest representable time",
            window.num_seconds()
        ))
    })
}

/// Moving-average crossover on close prices of a single market.
///
/// Each tick compares the short and long simple averages; a change in the
/// sign of their difference is a signal. Buys spend the whole base balance,
/// sells the whole market-currency balance.
pub struct DoubleCrossover {
    pair: Pair,
    config: DoubleCrossoverConfig,
    candles: Arc<dyn CandleStorage>,
    clock: Arc<dyn Clock>,
    orders: OrderLifecycle,
    tracker: CrossoverTracker,
    tick_count: u64,
}

impl DoubleCrossover {
    pub fn new(
        pair: Pair,
        config: DoubleCrossoverConfig,
        candles: Arc<dyn CandleStorage>,
        clock: Arc<dyn Clock>,
        orders: OrderLifecycle,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pair,
            config,
            candles,
            clock,
            orders,
            tracker: CrossoverTracker::new(),
            tick_count: 0,
        })
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn previous_sign(&self) -> Option<i8> {
        self.tracker.previous_sign()
    }

    fn single_market<'a>(&self, markets: &'a [Arc<dyn Market>]) -> Result<&'a dyn Market> {
        match markets {
            [market] => Ok(market.as_ref()),
            _ => Err(Error::StrategyConfiguration(format!(
                "{NAME} trades exactly one market, got {}",
                markets.len()
            ))),
        }
    }

    async fn average(&self, market: &dyn Market, window: Duration, now: DateTime<Utc>) -> Result<Decimal> {
        let interval = DateTimeInterval::between(window_start(now, window)?, now)?;
        self.candles
            .mean(market.name(), &self.pair, CandleField::Close, &interval, self.config.candle_size)
            .await
    }
}

#[async_trait]
impl Strategy for DoubleCrossover {
    fn name(&self) -> &str {
        NAME
    }

    fn pair(&self) -> &Pair {
        &self.pair
    }

    fn seconds_delay_between_ticks(&self) -> i64 {
        self.config.candle_size.seconds()
    }

    async fn tick(&mut self, markets: &[Arc<dyn Market>]) -> Result<()> {
        let market = self.single_market(markets)?;
        let now = self.clock.now();
        self.tick_count += 1;

        self.orders.reconcile(market, now).await?;

        let long_average = self.average(market, self.config.long_average_interval, now).await?;
        let short_average = self.average(market, self.config.short_average_interval, now).await?;
        let signal = self.tracker.observe(short_average, long_average);

        debug!(
            tick = self.tick_count,
            pair = %self.pair,
            long = %long_average,
            short = %short_average,
            previous_sign = ?self.tracker.previous_sign(),
            "Averages computed"
        );

        let Some(signal) = signal else {
            return Ok(());
        };

        info!(tick = self.tick_count, pair = %self.pair, signal = ?signal, "Crossover detected");
        self.orders.cancel_open(market, now).await?;
        self.orders.place_max_available(market, signal.direction(), now).await?;
        Ok(())
    }
}

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{
    Candle, CandleSize, CandleStorage, DateTimeInterval, Error, Fees, FrozenClock, Market, NullEmitter, Order,
    OrderDirection, OrderMarketInfo, OrderTemplate, Pair, PairMarketInfo, Result, StrategyRun, StrategyRunMarket,
};
use storage::MemoryStorage;
use strategy::{Strategy, StrategyDeps, StrategyRegistry};

pub const MARKET: &str = "paper";

pub fn pair() -> Pair {
    Pair::new("USD", "BTC").unwrap()
}

/// Time of the first tick.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).unwrap()
}

/// Closes at t0-3m .. t0 chosen so that, with a 4m long and 2m short window,
/// tick 1 sees long=8000/short=7900 and tick 2 (t0+1m) long=8000/short=8100.
pub async fn seed_crossing_candles(storage: &MemoryStorage) {
    let closes = [(-3, dec!(8100)), (-2, dec!(8000)), (-1, dec!(7900)), (0, dec!(8100))];
    let candles: Vec<Candle> = closes
        .iter()
        .map(|(offset, close)| {
            Candle::new(
                MARKET,
                pair(),
                t0() + Duration::minutes(*offset),
                *close,
                *close,
                *close,
                *close,
                CandleSize::ONE_MINUTE,
            )
            .unwrap()
        })
        .collect();
    storage.write_candles(&candles).await.unwrap();
}

/// Adds a 7000 close at t0+1m so tick 3 (t0+2m) crosses back down.
pub async fn seed_round_trip_candles(storage: &MemoryStorage) {
    seed_crossing_candles(storage).await;
    let close = dec!(7000);
    let candle = Candle::new(
        MARKET,
        pair(),
        t0() + Duration::minutes(1),
        close,
        close,
        close,
        close,
        CandleSize::ONE_MINUTE,
    )
    .unwrap();
    storage.write_candle(&candle).await.unwrap();
}

pub fn crossover_run() -> StrategyRun {
    StrategyRun {
        id: Uuid::from_u128(0xC0FFEE),
        run_at: t0(),
        pair: pair(),
        markets: vec![StrategyRunMarket {
            market_name: MARKET.into(),
            plugin_name: "recording".into(),
            configuration: BTreeMap::new(),
        }],
        strategy_name: "double_crossover".into(),
        strategy_configuration: BTreeMap::from([
            ("long_average_interval".to_string(), "4m".to_string()),
            ("short_average_interval".to_string(), "2m".to_string()),
            ("candle_size".to_string(), "1m".to_string()),
        ]),
        interval: DateTimeInterval::unbounded(),
        candle_storage_name: "memory".into(),
        order_storage_name: "memory".into(),
    }
}

pub fn build_strategy(run: &StrategyRun, storage: Arc<MemoryStorage>, clock: Arc<FrozenClock>) -> Box<dyn Strategy> {
    StrategyRegistry::with_builtins()
        .build(StrategyDeps {
            run,
            candles: storage.clone(),
            orders: storage.clone(),
            snapshots: storage,
            emitter: Arc::new(NullEmitter),
            clock,
        })
        .unwrap()
}

/// Market double that counts max-available calls and can refuse them.
pub struct RecordingMarket {
    pub buys: AtomicUsize,
    pub sells: AtomicUsize,
    pub cancels: AtomicUsize,
    pub refuse_for_balance: bool,
    /// Report placed orders as still resting instead of filled.
    pub resting: bool,
    /// Report placed orders as closed by the market with quantity left.
    pub dropped: bool,
    placed: AtomicUsize,
}

impl RecordingMarket {
    pub fn new(refuse_for_balance: bool) -> Self {
        Self {
            buys: AtomicUsize::new(0),
            sells: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            refuse_for_balance,
            resting: false,
            dropped: false,
            placed: AtomicUsize::new(0),
        }
    }

    pub fn dropped() -> Self {
        Self {
            dropped: true,
            ..Self::new(false)
        }
    }

    pub fn resting() -> Self {
        Self {
            resting: true,
            ..Self::new(false)
        }
    }

    fn refuse(&self, template: &OrderTemplate) -> Result<Order> {
        Err(Error::NotEnoughBalanceToPerformOrder {
            pair: template.pair.clone(),
            quantity: Decimal::ZERO,
            reason: "scripted refusal".into(),
        })
    }
}

#[async_trait]
impl Market for RecordingMarket {
    fn name(&self) -> &str {
        MARKET
    }

    fn fees(&self) -> Fees {
        Fees {
            maker: Decimal::ZERO,
            taker: Decimal::ZERO,
        }
    }

    async fn get_balance(&self, currency: &str) -> Result<Decimal> {
        Ok(if currency == "USD" { dec!(10000) } else { Decimal::ZERO })
    }

    async fn get_balances(&self) -> Result<BTreeMap<String, Decimal>> {
        Ok(BTreeMap::from([("USD".to_string(), dec!(10000))]))
    }

    async fn get_current_price(&self, _pair: &Pair) -> Result<Decimal> {
        Ok(dec!(8100))
    }

    async fn get_pair_market_info(&self, _pair: &Pair) -> Result<PairMarketInfo> {
        Ok(PairMarketInfo {
            min_order_size: dec!(0.0001),
        })
    }

    async fn place_order(&self, mut order: Order) -> Result<Order> {
        let n = self.placed.fetch_add(1, Ordering::SeqCst) + 1;
        order.set_id_on_market(format!("rec-{n}"));
        Ok(order)
    }

    async fn get_order_status(&self, _order: &Order) -> Result<OrderMarketInfo> {
        Ok(OrderMarketInfo {
            is_open: self.resting,
            quantity_remaining: if self.resting || self.dropped { dec!(1.2345) } else { Decimal::ZERO },
        })
    }

    async fn cancel_order(&self, _id_on_market: &str) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn buy_max_available(&self, template: &OrderTemplate) -> Result<Order> {
        self.buys.fetch_add(1, Ordering::SeqCst);
        if self.refuse_for_balance {
            return self.refuse(template);
        }
        let order = Order::market(template, MARKET, OrderDirection::Buy, dec!(1.2345))?;
        self.place_order(order).await
    }

    async fn sell_max_available(&self, template: &OrderTemplate) -> Result<Order> {
        self.sells.fetch_add(1, Ordering::SeqCst);
        if self.refuse_for_balance {
            return self.refuse(template);
        }
        let order = Order::market(template, MARKET, OrderDirection::Sell, dec!(1.2345))?;
        self.place_order(order).await
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    CandleSize, CandleStorage, Clock, ConfigField, ConfigSchema, Error, FieldKind, Fees, Market, Order,
    OrderDirection, OrderMarketInfo, OrderType, Pair, PairMarketInfo, RawConfig, Result,
};

/// Configuration keys accepted by the `paper` market plugin.
pub const SCHEMA: ConfigSchema = ConfigSchema::new(
    "paper",
    &[
        ConfigField { key: "balance_currency", kind: FieldKind::String, title: "Currency of the starting balance", default: Some("USD") },
        ConfigField { key: "initial_balance", kind: FieldKind::Decimal, title: "Starting balance", default: Some("1000") },
        ConfigField { key: "maker_fee", kind: FieldKind::Decimal, title: "Maker fee fraction", default: Some("0.0025") },
        ConfigField { key: "taker_fee", kind: FieldKind::Decimal, title: "Taker fee fraction", default: Some("0.0025") },
        ConfigField { key: "min_order_size", kind: FieldKind::Decimal, title: "Minimum order quantity", default: Some("0.00001") },
        ConfigField { key: "candle_size", kind: FieldKind::CandleSize, title: "Candle size used for pricing", default: Some("1m") },
    ],
);

/// A placed order as the simulated exchange tracks it.
#[derive(Debug, Clone)]
struct PaperOrder {
    pair: Pair,
    direction: OrderDirection,
    quantity: Decimal,
    rate: Decimal,
    remaining: Decimal,
    /// Set by `cancel_order`; `remaining` then holds the unfilled quantity.
    canceled: bool,
}

/// Simulated exchange for replays and paper trading.
///
/// Prices come from the close of the latest stored candle at the clock's
/// "now", so a replay that advances a frozen clock sees the market move
/// exactly as history did. Market orders fill immediately; limit orders
/// reserve funds and fill once the price crosses their rate. Fees are
/// charged on the received asset. No randomness, so identical inputs give
/// identical fills.
pub struct PaperMarket {
    name: String,
    candles: Arc<dyn CandleStorage>,
    clock: Arc<dyn Clock>,
    candle_size: CandleSize,
    fees: Fees,
    min_order_size: Decimal,
    balances: RwLock<BTreeMap<String, Decimal>>,
    orders: RwLock<BTreeMap<String, PaperOrder>>,
    next_order: AtomicU64,
}

impl PaperMarket {
    pub fn new(
        name: impl Into<String>,
        candles: Arc<dyn CandleStorage>,
        clock: Arc<dyn Clock>,
        candle_size: CandleSize,
        fees: Fees,
        min_order_size: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            candles,
            clock,
            candle_size,
            fees,
            min_order_size,
            balances: RwLock::new(BTreeMap::new()),
            orders: RwLock::new(BTreeMap::new()),
            next_order: AtomicU64::new(1),
        }
    }

    /// Build from raw plugin configuration, coerced through [`SCHEMA`].
    pub fn from_config(
        name: impl Into<String>,
        raw: &RawConfig,
        candles: Arc<dyn CandleStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let config = SCHEMA.coerce(raw)?;
        let fees = Fees {
            maker: config.decimal("maker_fee")?,
            taker: config.decimal("taker_fee")?,
        };
        let mut market = Self::new(
            name,
            candles,
            clock,
            config.candle_size("candle_size")?,
            fees,
            config.decimal("min_order_size")?,
        );
        let currency = config.string("balance_currency")?.to_uppercase();
        let balance = config.decimal("initial_balance")?;
        info!(
            market = %market.name,
            currency = %currency,
            balance = %balance,
            "PaperMarket initialized"
        );
        market.balances = RwLock::new(BTreeMap::from([(currency, balance)]));
        Ok(market)
    }

    /// Set a balance directly (test fixtures and manual top-ups).
    pub async fn set_balance(&self, currency: &str, amount: Decimal) {
        self.balances.write().await.insert(currency.to_string(), amount);
    }

    fn next_id_on_market(&self) -> String {
        format!("{}-{}", self.name, self.next_order.fetch_add(1, Ordering::Relaxed))
    }

    fn not_enough(order: &Order, reason: String) -> Error {
        Error::NotEnoughBalanceToPerformOrder {
            pair: order.pair().clone(),
            quantity: order.quantity(),
            reason,
        }
    }

    /// Move funds for a fill of `quantity` at `rate`. Funds for the paying
    /// side must already have been taken.
    fn credit_fill(
        balances: &mut BTreeMap<String, Decimal>,
        pair: &Pair,
        direction: OrderDirection,
        quantity: Decimal,
        rate: Decimal,
        fee: Decimal,
    ) {
        let keep = Decimal::ONE - fee;
        let (currency, amount) = match direction {
            OrderDirection::Buy => (pair.market_currency(), quantity * keep),
            OrderDirection::Sell => (pair.base_currency(), quantity * rate * keep),
        };
        *balances.entry(currency.to_string()).or_default() += amount;
    }

    /// Take what an order pays with, or reject it when the balance is short.
    fn debit(balances: &mut BTreeMap<String, Decimal>, order: &Order, rate: Decimal) -> Result<()> {
        let pair = order.pair();
        let (currency, amount) = match order.direction() {
            OrderDirection::Buy => (pair.base_currency(), order.quantity() * rate),
            OrderDirection::Sell => (pair.market_currency(), order.quantity()),
        };
        let available = balances.get(currency).copied().unwrap_or_default();
        if available < amount {
            return Err(Self::not_enough(
                order,
                format!("needs {amount} {currency}, has {available}"),
            ));
        }
        *balances.entry(currency.to_string()).or_default() -= amount;
        Ok(())
    }

    fn crosses(direction: OrderDirection, rate: Decimal, price: Decimal) -> bool {
        match direction {
            OrderDirection::Buy => price <= rate,
            OrderDirection::Sell => price >= rate,
        }
    }
}

#[async_trait]
impl Market for PaperMarket {
    fn name(&self) -> &str {
        &self.name
    }

    fn fees(&self) -> Fees {
        self.fees
    }

    async fn get_balance(&self, currency: &str) -> Result<Decimal> {
        Ok(self.balances.read().await.get(currency).copied().unwrap_or_default())
    }

    async fn get_balances(&self) -> Result<BTreeMap<String, Decimal>> {
        Ok(self
            .balances
            .read()
            .await
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(currency, amount)| (currency.clone(), *amount))
            .collect())
    }

    async fn get_current_price(&self, pair: &Pair) -> Result<Decimal> {
        let candle = self
            .candles
            .get_current_candle(&self.name, pair, self.candle_size, self.clock.now())
            .await?;
        Ok(candle.close())
    }

    async fn get_pair_market_info(&self, pair: &Pair) -> Result<PairMarketInfo> {
        match self.get_current_price(pair).await {
            Ok(_) => Ok(PairMarketInfo {
                min_order_size: self.min_order_size,
            }),
            Err(Error::NoCandlesForMarketInStorage { .. }) => Err(Error::MarketPairDoesNotExist {
                market: self.name.clone(),
                pair: pair.clone(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn place_order(&self, mut order: Order) -> Result<Order> {
        if order.market_name() != self.name {
            return Err(Error::MarketOrder {
                market: self.name.clone(),
                reason: format!("order is addressed to market '{}'", order.market_name()),
            });
        }
        if !order.is_open() {
            return Err(Error::MarketOrder {
                market: self.name.clone(),
                reason: format!("order {} is already {}", order.id(), order.status()),
            });
        }
        let info = self.get_pair_market_info(order.pair()).await?;
        if order.quantity() < info.min_order_size {
            return Err(Self::not_enough(
                &order,
                format!("below minimum order size {}", info.min_order_size),
            ));
        }

        let price = self.get_current_price(order.pair()).await?;
        let id_on_market = self.next_id_on_market();
        let mut balances = self.balances.write().await;

        match order.order_type() {
            OrderType::Market => {
                Self::debit(&mut balances, &order, price)?;
                Self::credit_fill(
                    &mut balances,
                    order.pair(),
                    order.direction(),
                    order.quantity(),
                    price,
                    self.fees.taker,
                );
                self.orders.write().await.insert(
                    id_on_market.clone(),
                    PaperOrder {
                        pair: order.pair().clone(),
                        direction: order.direction(),
                        quantity: order.quantity(),
                        rate: price,
                        remaining: Decimal::ZERO,
                        canceled: false,
                    },
                );
                debug!(
                    market = %self.name,
                    pair = %order.pair(),
                    direction = %order.direction(),
                    price = %price,
                    qty = %order.quantity(),
                    "Paper market order filled"
                );
            }
            OrderType::Limit => {
                let rate = order.rate().ok_or_else(|| Error::InvalidOrder("limit order without rate".into()))?;
                Self::debit(&mut balances, &order, rate)?;
                self.orders.write().await.insert(
                    id_on_market.clone(),
                    PaperOrder {
                        pair: order.pair().clone(),
                        direction: order.direction(),
                        quantity: order.quantity(),
                        rate,
                        remaining: order.quantity(),
                        canceled: false,
                    },
                );
                debug!(
                    market = %self.name,
                    pair = %order.pair(),
                    direction = %order.direction(),
                    rate = %rate,
                    qty = %order.quantity(),
                    "Paper limit order resting"
                );
            }
        }

        order.set_id_on_market(id_on_market);
        Ok(order)
    }

    /// Resting limit orders are matched lazily, against the price at the
    /// time of the status query.
    async fn get_order_status(&self, order: &Order) -> Result<OrderMarketInfo> {
        let id_on_market = order.id_on_market().ok_or_else(|| Error::MarketOrder {
            market: self.name.clone(),
            reason: format!("order {} was never placed", order.id()),
        })?;
        let tracked = self
            .orders
            .read()
            .await
            .get(id_on_market)
            .cloned()
            .ok_or_else(|| Error::MarketOrder {
                market: self.name.clone(),
                reason: format!("unknown order '{id_on_market}'"),
            })?;

        if tracked.canceled || tracked.remaining.is_zero() {
            return Ok(OrderMarketInfo {
                is_open: false,
                quantity_remaining: tracked.remaining,
            });
        }

        let price = self.get_current_price(&tracked.pair).await?;
        if !Self::crosses(tracked.direction, tracked.rate, price) {
            return Ok(OrderMarketInfo {
                is_open: true,
                quantity_remaining: tracked.remaining,
            });
        }

        let mut balances = self.balances.write().await;
        Self::credit_fill(
            &mut balances,
            &tracked.pair,
            tracked.direction,
            tracked.remaining,
            tracked.rate,
            self.fees.maker,
        );
        if let Some(o) = self.orders.write().await.get_mut(id_on_market) {
            o.remaining = Decimal::ZERO;
        }
        debug!(market = %self.name, id = %id_on_market, price = %price, "Paper limit order filled");
        Ok(OrderMarketInfo {
            is_open: false,
            quantity_remaining: Decimal::ZERO,
        })
    }

    async fn cancel_order(&self, id_on_market: &str) -> Result<()> {
        let mut balances = self.balances.write().await;
        let mut orders = self.orders.write().await;
        let tracked = orders.get_mut(id_on_market).ok_or_else(|| Error::MarketOrder {
            market: self.name.clone(),
            reason: format!("unknown order '{id_on_market}'"),
        })?;
        if tracked.canceled || tracked.remaining.is_zero() {
            return Ok(());
        }

        let (currency, refund) = match tracked.direction {
            OrderDirection::Buy => (tracked.pair.base_currency().to_string(), tracked.remaining * tracked.rate),
            OrderDirection::Sell => (tracked.pair.market_currency().to_string(), tracked.remaining),
        };
        tracked.canceled = true;
        *balances.entry(currency).or_default() += refund;
        debug!(market = %self.name, id = %id_on_market, qty = %tracked.quantity, "Paper order canceled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common::{Candle, FrozenClock, OrderTemplate};
    use rust_decimal_macros::dec;
    use storage::MemoryStorage;
    use uuid::Uuid;

    fn pair() -> Pair {
        Pair::new("USD", "BTC").unwrap()
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    async fn market_with_prices(closes: &[Decimal], fee: Decimal) -> (PaperMarket, Arc<FrozenClock>) {
        let storage = Arc::new(MemoryStorage::new());
        for (i, close) in closes.iter().enumerate() {
            let candle = Candle::new(
                "paper",
                pair(),
                start() + Duration::minutes(i as i64),
                *close,
                *close,
                *close,
                *close,
                CandleSize::ONE_MINUTE,
            )
            .unwrap();
            storage.write_candle(&candle).await.unwrap();
        }
        let clock = Arc::new(FrozenClock::new(start()));
        let market = PaperMarket::new(
            "paper",
            storage,
            clock.clone(),
            CandleSize::ONE_MINUTE,
            Fees { maker: fee, taker: fee },
            dec!(0.001),
        );
        market.set_balance("USD", dec!(10000)).await;
        (market, clock)
    }

    fn template(n: u128) -> OrderTemplate {
        OrderTemplate {
            order_id: Uuid::from_u128(n),
            strategy_run_id: Uuid::nil(),
            pair: pair(),
            created_at: start(),
        }
    }

    #[tokio::test]
    async fn market_buy_fills_at_current_close_minus_fee() {
        let (market, _) = market_with_prices(&[dec!(1000)], dec!(0.01)).await;

        let order = Order::market(&template(1), "paper", OrderDirection::Buy, dec!(2)).unwrap();
        let placed = market.place_order(order).await.unwrap();

        assert_eq!(placed.id_on_market(), Some("paper-1"));
        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(8000));
        assert_eq!(market.get_balance("BTC").await.unwrap(), dec!(1.98));
        let status = market.get_order_status(&placed).await.unwrap();
        assert!(!status.is_open);
    }

    #[tokio::test]
    async fn market_sell_credits_base_currency() {
        let (market, _) = market_with_prices(&[dec!(1000)], dec!(0)).await;
        market.set_balance("BTC", dec!(1)).await;

        let order = Order::market(&template(1), "paper", OrderDirection::Sell, dec!(1)).unwrap();
        market.place_order(order).await.unwrap();

        assert_eq!(market.get_balance("BTC").await.unwrap(), dec!(0));
        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(11000));
        assert_eq!(
            market.get_balances().await.unwrap(),
            BTreeMap::from([("USD".to_string(), dec!(11000))])
        );
    }

    #[tokio::test]
    async fn price_follows_the_clock() {
        let (market, clock) = market_with_prices(&[dec!(1000), dec!(1100)], dec!(0)).await;
        assert_eq!(market.get_current_price(&pair()).await.unwrap(), dec!(1000));
        clock.advance(Duration::seconds(90));
        assert_eq!(market.get_current_price(&pair()).await.unwrap(), dec!(1100));
    }

    #[tokio::test]
    async fn below_minimum_size_is_not_enough_balance() {
        let (market, _) = market_with_prices(&[dec!(1000)], dec!(0)).await;
        let order = Order::market(&template(1), "paper", OrderDirection::Buy, dec!(0.0001)).unwrap();
        let err = market.place_order(order).await.unwrap_err();
        assert!(err.is_not_enough_balance());
    }

    #[tokio::test]
    async fn overspending_is_not_enough_balance() {
        let (market, _) = market_with_prices(&[dec!(1000)], dec!(0)).await;
        let order = Order::market(&template(1), "paper", OrderDirection::Buy, dec!(11)).unwrap();
        let err = market.place_order(order).await.unwrap_err();
        assert!(err.is_not_enough_balance());
        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(10000));
    }

    #[tokio::test]
    async fn buy_max_available_spends_everything() {
        let (market, _) = market_with_prices(&[dec!(3000)], dec!(0)).await;
        let placed = market.buy_max_available(&template(1)).await.unwrap();

        assert_eq!(placed.quantity(), dec!(3.33333333));
        assert!(market.get_balance("USD").await.unwrap() < dec!(0.0001));
        assert!(market.get_balance("USD").await.unwrap() >= dec!(0));

        let again = market.buy_max_available(&template(2)).await.unwrap_err();
        assert!(again.is_not_enough_balance());
    }

    #[tokio::test]
    async fn limit_buy_rests_until_price_drops() {
        let (market, clock) = market_with_prices(&[dec!(1000), dec!(900)], dec!(0)).await;
        let order = Order::limit(&template(1), "paper", OrderDirection::Buy, dec!(1), dec!(950)).unwrap();
        let placed = market.place_order(order).await.unwrap();
        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(9050));

        let status = market.get_order_status(&placed).await.unwrap();
        assert!(status.is_open);
        assert_eq!(status.quantity_remaining, dec!(1));

        clock.advance(Duration::minutes(1));
        let status = market.get_order_status(&placed).await.unwrap();
        assert!(!status.is_open);
        assert_eq!(market.get_balance("BTC").await.unwrap(), dec!(1));
    }

    #[tokio::test]
    async fn cancel_refunds_reserved_funds() {
        let (market, _) = market_with_prices(&[dec!(1000)], dec!(0)).await;
        let order = Order::limit(&template(1), "paper", OrderDirection::Buy, dec!(2), dec!(500)).unwrap();
        let placed = market.place_order(order).await.unwrap();
        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(9000));

        market.cancel_order(placed.id_on_market().unwrap()).await.unwrap();
        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(10000));
        let status = market.get_order_status(&placed).await.unwrap();
        assert!(!status.is_open);
        assert_eq!(status.quantity_remaining, dec!(2));

        // A second cancel must not refund twice.
        market.cancel_order(placed.id_on_market().unwrap()).await.unwrap();
        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(10000));
    }

    #[tokio::test]
    async fn filled_orders_report_nothing_remaining() {
        let (market, _) = market_with_prices(&[dec!(1000)], dec!(0)).await;
        let order = Order::market(&template(1), "paper", OrderDirection::Buy, dec!(2)).unwrap();
        let placed = market.place_order(order).await.unwrap();

        let status = market.get_order_status(&placed).await.unwrap();
        assert!(!status.is_open);
        assert!(status.quantity_remaining.is_zero());
    }

    #[tokio::test]
    async fn unknown_pair_does_not_exist() {
        let (market, _) = market_with_prices(&[dec!(1000)], dec!(0)).await;
        let eth = Pair::new("USD", "ETH").unwrap();
        assert!(matches!(
            market.get_pair_market_info(&eth).await,
            Err(Error::MarketPairDoesNotExist { .. })
        ));
    }

    #[tokio::test]
    async fn from_config_applies_schema_defaults() {
        let storage: Arc<dyn CandleStorage> = Arc::new(MemoryStorage::new());
        let clock = Arc::new(FrozenClock::new(start()));
        let raw = RawConfig::from([("initial_balance".to_string(), "250".to_string())]);
        let market = PaperMarket::from_config("paper", &raw, storage, clock).unwrap();

        assert_eq!(market.get_balance("USD").await.unwrap(), dec!(250));
        assert_eq!(market.fees(), Fees { maker: dec!(0.0025), taker: dec!(0.0025) });
    }
}

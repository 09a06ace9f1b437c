use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    Error, Fees, Order, OrderDirection, OrderMarketInfo, OrderTemplate, Pair, PairMarketInfo, Result,
};

/// Quantities handed to markets are truncated to this many decimal places.
pub const QUANTITY_SCALE: u32 = 8;

/// Capabilities an exchange adapter provides to strategies.
///
/// Live adapters talk to an exchange; `paper::PaperMarket` simulates one from
/// stored candles. Strategies only ever see `dyn Market`, so a replay runs the
/// exact code path a live run does.
#[async_trait]
pub trait Market: Send + Sync {
    fn name(&self) -> &str;

    fn fees(&self) -> Fees;

    async fn get_balance(&self, currency: &str) -> Result<Decimal>;

    /// All non-zero balances, keyed by currency symbol.
    async fn get_balances(&self) -> Result<BTreeMap<String, Decimal>>;

    async fn get_current_price(&self, pair: &Pair) -> Result<Decimal>;

    /// Fails with `MarketPairDoesNotExist` when the market does not list `pair`.
    async fn get_pair_market_info(&self, pair: &Pair) -> Result<PairMarketInfo>;

    /// Submit an order and return it with `id_on_market` populated.
    ///
    /// Quantities below the pair's minimum size fail with
    /// `NotEnoughBalanceToPerformOrder`; other rejections with `MarketOrder`.
    async fn place_order(&self, order: Order) -> Result<Order>;

    async fn get_order_status(&self, order: &Order) -> Result<OrderMarketInfo>;

    async fn cancel_order(&self, id_on_market: &str) -> Result<()>;

    /// How much of the market currency the base balance buys at `price`.
    async fn calculate_maximal_amount_to_buy(&self, pair: &Pair, price: Decimal) -> Result<Decimal> {
        if price <= Decimal::ZERO {
            return Err(Error::MarketOrder {
                market: self.name().to_string(),
                reason: format!("cannot size a buy of {pair} at price {price}"),
            });
        }
        let balance = self.get_balance(pair.base_currency()).await?;
        Ok(balance / price)
    }

    async fn calculate_maximal_amount_to_sell(&self, pair: &Pair) -> Result<Decimal> {
        self.get_balance(pair.market_currency()).await
    }

    /// Spend the whole base-currency balance on a market buy.
    async fn buy_max_available(&self, template: &OrderTemplate) -> Result<Order> {
        let price = self.get_current_price(&template.pair).await?;
        let quantity = self.calculate_maximal_amount_to_buy(&template.pair, price).await?;
        self.place_max_available(template, OrderDirection::Buy, quantity).await
    }

    /// Sell the whole market-currency balance with a market order.
    async fn sell_max_available(&self, template: &OrderTemplate) -> Result<Order> {
        let quantity = self.calculate_maximal_amount_to_sell(&template.pair).await?;
        self.place_max_available(template, OrderDirection::Sell, quantity).await
    }

    async fn place_max_available(
        &self,
        template: &OrderTemplate,
        direction: OrderDirection,
        quantity: Decimal,
    ) -> Result<Order> {
        let quantity = quantity.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::ToZero);
        if quantity <= Decimal::ZERO {
            return Err(Error::NotEnoughBalanceToPerformOrder {
                pair: template.pair.clone(),
                quantity,
                reason: format!("nothing available to {direction}"),
            });
        }
        let order = Order::market(template, self.name(), direction, quantity)?;
        self.place_order(order).await
    }
}

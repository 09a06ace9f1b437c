use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, OrderDirection, OrderStatus, OrderType, Pair, Result};

/// A trading intent and its record once handed to a market.
///
/// `close` and `cancel` are the only mutations besides attaching the id the
/// exchange assigned; both are one-way moves out of `Open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OrderRecord")]
pub struct Order {
    id: Uuid,
    strategy_run_id: Uuid,
    market_name: String,
    direction: OrderDirection,
    created_at: DateTime<Utc>,
    pair: Pair,
    order_type: OrderType,
    quantity: Decimal,
    rate: Option<Decimal>,
    id_on_market: Option<String>,
    status: OrderStatus,
    closed_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
}

/// Unvalidated wire/storage form of an [`Order`].
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub strategy_run_id: Uuid,
    pub market_name: String,
    pub direction: OrderDirection,
    pub created_at: DateTime<Utc>,
    pub pair: Pair,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
    pub id_on_market: Option<String>,
    pub status: OrderStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = Error;

    fn try_from(r: OrderRecord) -> Result<Self> {
        validate_shape(r.order_type, r.quantity, r.rate)?;
        let timestamps_match = match r.status {
            OrderStatus::Open => r.closed_at.is_none() && r.canceled_at.is_none(),
            OrderStatus::Closed => r.closed_at.is_some() && r.canceled_at.is_none(),
            OrderStatus::Canceled => r.canceled_at.is_some() && r.closed_at.is_none(),
        };
        if !timestamps_match {
            return Err(Error::InvalidOrder(format!(
                "order {} has status {} but closed_at={:?}, canceled_at={:?}",
                r.id, r.status, r.closed_at, r.canceled_at
            )));
        }
        Ok(Self {
            id: r.id,
            strategy_run_id: r.strategy_run_id,
            market_name: r.market_name,
            direction: r.direction,
            created_at: r.created_at,
            pair: r.pair,
            order_type: r.order_type,
            quantity: r.quantity,
            rate: r.rate,
            id_on_market: r.id_on_market,
            status: r.status,
            closed_at: r.closed_at,
            canceled_at: r.canceled_at,
        })
    }
}

fn validate_shape(order_type: OrderType, quantity: Decimal, rate: Option<Decimal>) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(Error::InvalidOrder(format!("quantity must be positive, got {quantity}")));
    }
    match (order_type, rate) {
        (OrderType::Market, Some(rate)) => Err(Error::InvalidOrder(format!(
            "market orders carry no rate, got {rate}"
        ))),
        (OrderType::Limit, None) => Err(Error::InvalidOrder("limit orders require a rate".into())),
        (OrderType::Limit, Some(rate)) if rate <= Decimal::ZERO => Err(Error::InvalidOrder(format!(
            "limit rate must be positive, got {rate}"
        ))),
        _ => Ok(()),
    }
}

/// Identity and provenance of an order that is about to be sized by a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTemplate {
    pub order_id: Uuid,
    pub strategy_run_id: Uuid,
    pub pair: Pair,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        strategy_run_id: Uuid,
        market_name: impl Into<String>,
        direction: OrderDirection,
        created_at: DateTime<Utc>,
        pair: Pair,
        order_type: OrderType,
        quantity: Decimal,
        rate: Option<Decimal>,
    ) -> Result<Self> {
        validate_shape(order_type, quantity, rate)?;
        Ok(Self {
            id,
            strategy_run_id,
            market_name: market_name.into(),
            direction,
            created_at,
            pair,
            order_type,
            quantity,
            rate,
            id_on_market: None,
            status: OrderStatus::Open,
            closed_at: None,
            canceled_at: None,
        })
    }

    /// Market order for `quantity` of the pair's market currency.
    pub fn market(
        template: &OrderTemplate,
        market_name: impl Into<String>,
        direction: OrderDirection,
        quantity: Decimal,
    ) -> Result<Self> {
        Self::new(
            template.order_id,
            template.strategy_run_id,
            market_name,
            direction,
            template.created_at,
            template.pair.clone(),
            OrderType::Market,
            quantity,
            None,
        )
    }

    pub fn limit(
        template: &OrderTemplate,
        market_name: impl Into<String>,
        direction: OrderDirection,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Self> {
        Self::new(
            template.order_id,
            template.strategy_run_id,
            market_name,
            direction,
            template.created_at,
            template.pair.clone(),
            OrderType::Limit,
            quantity,
            Some(rate),
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn strategy_run_id(&self) -> Uuid {
        self.strategy_run_id
    }

    pub fn market_name(&self) -> &str {
        &self.market_name
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn rate(&self) -> Option<Decimal> {
        self.rate
    }

    pub fn id_on_market(&self) -> Option<&str> {
        self.id_on_market.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn canceled_at(&self) -> Option<DateTime<Utc>> {
        self.canceled_at
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == OrderStatus::Closed
    }

    pub fn is_canceled(&self) -> bool {
        self.status == OrderStatus::Canceled
    }

    pub fn set_id_on_market(&mut self, id_on_market: impl Into<String>) {
        self.id_on_market = Some(id_on_market.into());
    }

    pub fn close(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.leave_open(OrderStatus::Closed)?;
        self.closed_at = Some(at);
        Ok(())
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.leave_open(OrderStatus::Canceled)?;
        self.canceled_at = Some(at);
        Ok(())
    }

    fn leave_open(&mut self, to: OrderStatus) -> Result<()> {
        if self.status != OrderStatus::Open {
            return Err(Error::InvalidOrderTransition {
                order_id: self.id.to_string(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

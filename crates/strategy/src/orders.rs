use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::{
    EventEmitter, Market, Order, OrderDirection, OrderFilter, OrderStorage, OrderTemplate, Pair,
    PortfolioSnapshot, PortfolioSnapshotStorage, Result,
};

/// Order side effects of one strategy run: placement, reconciliation with the
/// market, cancellation, snapshots and event emission.
///
/// Ids are derived from the run id and a per-run sequence, so replaying the
/// same run produces the same orders byte for byte.
pub struct OrderLifecycle {
    strategy_run_id: Uuid,
    pair: Pair,
    order_storage_name: String,
    order_storage: Arc<dyn OrderStorage>,
    snapshots: Arc<dyn PortfolioSnapshotStorage>,
    emitter: Arc<dyn EventEmitter>,
    sequence: u64,
}

impl OrderLifecycle {
    pub fn new(
        strategy_run_id: Uuid,
        pair: Pair,
        order_storage_name: impl Into<String>,
        order_storage: Arc<dyn OrderStorage>,
        snapshots: Arc<dyn PortfolioSnapshotStorage>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            strategy_run_id,
            pair,
            order_storage_name: order_storage_name.into(),
            order_storage,
            snapshots,
            emitter,
            sequence: 0,
        }
    }

    fn next_ids(&mut self) -> (Uuid, Uuid) {
        self.sequence += 1;
        let seq = self.sequence;
        (
            Uuid::new_v5(&self.strategy_run_id, format!("order-{seq}").as_bytes()),
            Uuid::new_v5(&self.strategy_run_id, format!("snapshot-{seq}").as_bytes()),
        )
    }

    async fn persist(&self, order: &Order) -> Result<()> {
        self.order_storage.save_order(order).await?;
        self.emitter.emit_new_order(&self.order_storage_name, order);
        Ok(())
    }

    /// Open orders this run placed on `market`. Other runs sharing the
    /// storage are never touched.
    async fn open_orders(&self, market: &dyn Market) -> Result<Vec<Order>> {
        self.order_storage
            .find_by(market.name(), &self.pair, &OrderFilter::open_for_run(self.strategy_run_id))
            .await
    }

    /// Settle every stored open order the market no longer reports as open:
    /// filled orders are closed, orders dropped with quantity left are
    /// canceled.
    pub async fn reconcile(&self, market: &dyn Market, now: DateTime<Utc>) -> Result<usize> {
        let mut settled = 0;
        for mut order in self.open_orders(market).await? {
            if order.id_on_market().is_none() {
                debug!(order_id = %order.id(), "Open order was never placed, skipping");
                continue;
            }
            let status = market.get_order_status(&order).await?;
            if status.is_open {
                continue;
            }
            if status.quantity_remaining > Decimal::ZERO {
                order.cancel(now)?;
                info!(
                    order_id = %order.id(),
                    market = %market.name(),
                    remaining = %status.quantity_remaining,
                    "Order canceled by market"
                );
            } else {
                order.close(now)?;
                info!(order_id = %order.id(), market = %market.name(), pair = %self.pair, "Order closed");
            }
            self.persist(&order).await?;
            settled += 1;
        }
        Ok(settled)
    }

    /// Cancel whatever is still open for the pair before a new decision.
    pub async fn cancel_open(&self, market: &dyn Market, now: DateTime<Utc>) -> Result<usize> {
        let mut canceled = 0;
        for mut order in self.open_orders(market).await? {
            if let Some(id_on_market) = order.id_on_market() {
                market.cancel_order(id_on_market).await?;
            }
            order.cancel(now)?;
            self.persist(&order).await?;
            info!(order_id = %order.id(), market = %market.name(), pair = %self.pair, "Order canceled");
            canceled += 1;
        }
        Ok(canceled)
    }

    /// Snapshot balances, then spend everything available in `direction`.
    ///
    /// Returns `Ok(None)` after a warning when the market lacks the balance;
    /// nothing is persisted in that case.
    pub async fn place_max_available(
        &mut self,
        market: &dyn Market,
        direction: OrderDirection,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let (order_id, snapshot_id) = self.next_ids();
        let balances = market.get_balances().await?;
        let template = OrderTemplate {
            order_id,
            strategy_run_id: self.strategy_run_id,
            pair: self.pair.clone(),
            created_at: now,
        };

        let placed = match direction {
            OrderDirection::Buy => market.buy_max_available(&template).await,
            OrderDirection::Sell => market.sell_max_available(&template).await,
        };
        let order = match placed {
            Ok(order) => order,
            Err(e) if e.is_not_enough_balance() => {
                warn!(
                    market = %market.name(),
                    pair = %self.pair,
                    direction = %direction,
                    error = %e,
                    "Not enough balance, skipping order"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.persist(&order).await?;
        self.snapshots
            .save_snapshot(&PortfolioSnapshot {
                id: snapshot_id,
                order_id: order.id(),
                strategy_run_id: self.strategy_run_id,
                market_name: market.name().to_string(),
                balances,
                taken_at: now,
            })
            .await?;

        info!(
            order_id = %order.id(),
            market = %market.name(),
            pair = %self.pair,
            direction = %direction,
            qty = %order.quantity(),
            "Order placed"
        );
        Ok(Some(order))
    }
}

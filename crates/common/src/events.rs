use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{Candle, Order, StrategyRun};

/// Notification published for frontends and other observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    NewCandles {
        storage_name: String,
        candles: Vec<Candle>,
    },
    NewOrder {
        storage_name: String,
        order: Order,
    },
    NewStrategyRun {
        run: StrategyRun,
    },
}

/// Fire-and-forget sink for platform events.
///
/// Emission is best-effort: implementations swallow their own failures so a
/// slow or absent observer can never abort a strategy tick.
pub trait EventEmitter: Send + Sync {
    fn emit_new_candles(&self, storage_name: &str, candles: &[Candle]);

    fn emit_new_order(&self, storage_name: &str, order: &Order);

    fn emit_new_strategy_run(&self, run: &StrategyRun);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmitter;

impl EventEmitter for NullEmitter {
    fn emit_new_candles(&self, _storage_name: &str, _candles: &[Candle]) {}

    fn emit_new_order(&self, _storage_name: &str, _order: &Order) {}

    fn emit_new_strategy_run(&self, _run: &StrategyRun) {}
}

/// Fans events out to every current subscriber of a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<PlatformEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: PlatformEvent) {
        if self.tx.send(event).is_err() {
            debug!("No event subscribers, event dropped");
        }
    }
}

impl EventEmitter for BroadcastEmitter {
    fn emit_new_candles(&self, storage_name: &str, candles: &[Candle]) {
        self.publish(PlatformEvent::NewCandles {
            storage_name: storage_name.to_string(),
            candles: candles.to_vec(),
        });
    }

    fn emit_new_order(&self, storage_name: &str, order: &Order) {
        self.publish(PlatformEvent::NewOrder {
            storage_name: storage_name.to_string(),
            order: order.clone(),
        });
    }

    fn emit_new_strategy_run(&self, run: &StrategyRun) {
        self.publish(PlatformEvent::NewStrategyRun { run: run.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrderDirection, OrderTemplate, Pair};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order() -> Order {
        let template = OrderTemplate {
            order_id: Uuid::nil(),
            strategy_run_id: Uuid::nil(),
            pair: Pair::new("USD", "BTC").unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        Order::market(&template, "paper", OrderDirection::Buy, dec!(1)).unwrap()
    }

    #[test]
    fn emitting_without_subscribers_does_not_fail() {
        let emitter = BroadcastEmitter::new(8);
        emitter.emit_new_order("memory", &order());
    }

    #[tokio::test]
    async fn subscribers_receive_orders() {
        let emitter = BroadcastEmitter::new(8);
        let mut rx = emitter.subscribe();
        emitter.emit_new_order("memory", &order());

        match rx.recv().await.unwrap() {
            PlatformEvent::NewOrder { storage_name, order: received } => {
                assert_eq!(storage_name, "memory");
                assert_eq!(received, order());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = PlatformEvent::NewOrder {
            storage_name: "memory".into(),
            order: order(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "new_order");
        assert_eq!(json["order"]["pair"], "USD_BTC");
    }
}

//! Kept in its own test binary: it installs a thread-local subscriber and
//! counts WARN events.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use common::{FrozenClock, Market, OrderFilter, OrderStorage, PortfolioSnapshotStorage};
use storage::MemoryStorage;
use support::*;

struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn refused_buy_warns_once_and_persists_nothing() {
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let storage = Arc::new(MemoryStorage::new());
    seed_crossing_candles(&storage).await;
    let clock = Arc::new(FrozenClock::new(t0()));
    let run = crossover_run();
    let mut strategy = build_strategy(&run, storage.clone(), clock.clone());

    let recording = Arc::new(RecordingMarket::new(true));
    let markets: Vec<Arc<dyn Market>> = vec![recording.clone()];

    strategy.tick(&markets).await.unwrap();
    clock.advance(Duration::minutes(1));
    strategy.tick(&markets).await.unwrap();

    assert_eq!(recording.buys.load(Ordering::SeqCst), 1);
    assert_eq!(warnings.load(Ordering::SeqCst), 1);

    let orders = OrderStorage::find_by(storage.as_ref(), MARKET, &pair(), &OrderFilter::default())
        .await
        .unwrap();
    assert!(orders.is_empty());
    assert!(storage.find_by_strategy_run(run.id).await.unwrap().is_empty());
}

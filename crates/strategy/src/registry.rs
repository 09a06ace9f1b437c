use std::sync::Arc;

use tracing::info;

use common::{
    CandleStorage, Clock, EventEmitter, OrderStorage, PortfolioSnapshotStorage, Registry, Result, StrategyRun,
};

use crate::double_crossover::{self, DoubleCrossover, DoubleCrossoverConfig};
use crate::orders::OrderLifecycle;
use crate::Strategy;

/// Everything a strategy factory may bind at construction time.
pub struct StrategyDeps<'a> {
    pub run: &'a StrategyRun,
    pub candles: Arc<dyn CandleStorage>,
    pub orders: Arc<dyn OrderStorage>,
    pub snapshots: Arc<dyn PortfolioSnapshotStorage>,
    pub emitter: Arc<dyn EventEmitter>,
    pub clock: Arc<dyn Clock>,
}

impl StrategyDeps<'_> {
    /// Order side effects scoped to this run.
    pub fn order_lifecycle(&self) -> OrderLifecycle {
        OrderLifecycle::new(
            self.run.id,
            self.run.pair.clone(),
            self.run.order_storage_name.clone(),
            self.orders.clone(),
            self.snapshots.clone(),
            self.emitter.clone(),
        )
    }
}

pub type StrategyFactory = fn(StrategyDeps<'_>) -> Result<Box<dyn Strategy>>;

/// Strategy name → constructor.
pub struct StrategyRegistry {
    factories: Registry<StrategyFactory>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            factories: Registry::new("strategy"),
        }
    }

    /// Registry holding every strategy shipped with this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(double_crossover::NAME, build_double_crossover);
        registry
    }

    pub fn register(&mut self, name: &str, factory: StrategyFactory) -> &mut Self {
        self.factories.register(name, factory);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.names()
    }

    /// Construct the strategy named by `deps.run`.
    pub fn build(&self, deps: StrategyDeps<'_>) -> Result<Box<dyn Strategy>> {
        let factory = self.factories.get(&deps.run.strategy_name)?;
        let strategy = factory(deps)?;
        info!(name = %strategy.name(), pair = %strategy.pair(), "Strategy built");
        Ok(strategy)
    }
}

// ─── Builders ────────────────────────────────────────────────────────────────

fn build_double_crossover(deps: StrategyDeps<'_>) -> Result<Box<dyn Strategy>> {
    let config = DoubleCrossoverConfig::from_raw(&deps.run.strategy_configuration)?;
    let strategy = DoubleCrossover::new(
        deps.run.pair.clone(),
        config,
        deps.candles.clone(),
        deps.clock.clone(),
        deps.order_lifecycle(),
    )?;
    Ok(Box::new(strategy))
}

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use common::{Clock, Error, EventEmitter, FrozenClock, Market, Result, StrategyRun, SystemClock, TradingMode};
use storage::StorageRegistry;
use strategy::{Strategy, StrategyDeps, StrategyRegistry};

use crate::plugins::{MarketDeps, MarketRegistry};
use crate::replayer::{ReplaySummary, StrategyReplayer};
use crate::runner::StrategyRunner;

/// Handle to a spawned run.
pub struct RunHandle {
    pub run_id: Uuid,
    pub mode: TradingMode,
    pub task: JoinHandle<Result<()>>,
}

/// Composition of registries that turns `StrategyRun` descriptors into
/// running tasks.
pub struct Launcher {
    markets: MarketRegistry,
    strategies: StrategyRegistry,
    storages: StorageRegistry,
    emitter: Arc<dyn EventEmitter>,
}

impl Launcher {
    pub fn new(
        markets: MarketRegistry,
        strategies: StrategyRegistry,
        storages: StorageRegistry,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            markets,
            strategies,
            storages,
            emitter,
        }
    }

    pub fn storages(&self) -> &StorageRegistry {
        &self.storages
    }

    /// Resolve every name in `run` and construct its strategy and markets
    /// around `clock`.
    pub fn bind(
        &self,
        run: &StrategyRun,
        clock: Arc<dyn Clock>,
    ) -> Result<(Box<dyn Strategy>, Vec<Arc<dyn Market>>)> {
        let candles = self.storages.candles(&run.candle_storage_name)?;
        let orders = self.storages.orders(&run.order_storage_name)?;

        let markets = run
            .markets
            .iter()
            .map(|m| {
                self.markets.build(
                    &m.plugin_name,
                    MarketDeps {
                        market_name: &m.market_name,
                        configuration: &m.configuration,
                        candles: candles.clone(),
                        clock: clock.clone(),
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let strategy = self.strategies.build(StrategyDeps {
            run,
            candles,
            orders,
            snapshots: self.storages.snapshots(),
            emitter: self.emitter.clone(),
            clock,
        })?;
        Ok((strategy, markets))
    }

    /// Persist and announce a run before anything executes.
    async fn record(&self, run: &StrategyRun) -> Result<()> {
        self.storages.runs().save_strategy_run(run).await?;
        self.emitter.emit_new_strategy_run(run);
        info!(
            run_id = %run.id,
            strategy = %run.strategy_name,
            pair = %run.pair,
            markets = run.markets.len(),
            "Strategy run recorded"
        );
        Ok(())
    }

    /// Replay `run` over its interval on the current task.
    pub async fn replay(&self, run: &StrategyRun) -> Result<ReplaySummary> {
        let (since, till) = match (run.interval.since, run.interval.till) {
            (Some(since), Some(till)) => (since, till),
            _ => {
                return Err(Error::StrategyConfiguration(format!(
                    "replay of run {} needs both since and till, got {}",
                    run.id, run.interval
                )))
            }
        };
        let clock = Arc::new(FrozenClock::new(since));
        let (strategy, markets) = self.bind(run, clock.clone())?;
        self.record(run).await?;
        StrategyReplayer::new(run.id, strategy, markets, clock, till).run().await
    }

    /// Bind, record and spawn `run` on its own task.
    pub async fn launch(self: &Arc<Self>, run: StrategyRun, mode: TradingMode) -> Result<RunHandle> {
        let run_id = run.id;
        let task = match mode {
            TradingMode::Live => {
                let (strategy, markets) = self.bind(&run, Arc::new(SystemClock))?;
                self.record(&run).await?;
                tokio::spawn(StrategyRunner::new(run_id, strategy, markets).run())
            }
            TradingMode::Replay => {
                let launcher = self.clone();
                tokio::spawn(async move { launcher.replay(&run).await.map(|_| ()) })
            }
        };
        info!(run_id = %run_id, mode = %mode, "Strategy run spawned");
        Ok(RunHandle { run_id, mode, task })
    }
}

impl RunHandle {
    /// Wait for the run to end and log how it ended.
    pub async fn join(self) -> Result<()> {
        let outcome = self
            .task
            .await
            .map_err(|e| Error::Other(format!("run {} task failed: {e}", self.run_id)))?;
        match &outcome {
            Ok(()) => info!(run_id = %self.run_id, "Strategy run finished"),
            Err(e) => error!(run_id = %self.run_id, error = %e, "Strategy run failed"),
        }
        outcome
    }
}

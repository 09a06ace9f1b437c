use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use common::{Error, Market, Result};
use strategy::Strategy;

/// Tick once, applying the shared skip policy: missing candles skip the tick
/// with a warning, every other error ends the run.
pub(crate) async fn step(
    run_id: Uuid,
    strategy: &mut dyn Strategy,
    markets: &[Arc<dyn Market>],
) -> Result<()> {
    match strategy.tick(markets).await {
        Ok(()) => Ok(()),
        Err(e @ Error::NoCandlesForMarketInStorage { .. }) => {
            warn!(run_id = %run_id, error = %e, "Skipping tick, candles not available yet");
            Ok(())
        }
        Err(e) => {
            error!(run_id = %run_id, strategy = %strategy.name(), error = %e, "Strategy run aborted");
            Err(e)
        }
    }
}

/// Drives a strategy against the wall clock until it fails or the task is
/// aborted.
pub struct StrategyRunner {
    run_id: Uuid,
    strategy: Box<dyn Strategy>,
    markets: Vec<Arc<dyn Market>>,
}

impl StrategyRunner {
    pub fn new(run_id: Uuid, strategy: Box<dyn Strategy>, markets: Vec<Arc<dyn Market>>) -> Self {
        Self {
            run_id,
            strategy,
            markets,
        }
    }

    /// Run the tick loop. Call from `tokio::spawn`.
    pub async fn run(mut self) -> Result<()> {
        let delay = self.strategy.seconds_delay_between_ticks().max(1) as u64;
        info!(
            run_id = %self.run_id,
            strategy = %self.strategy.name(),
            pair = %self.strategy.pair(),
            delay_secs = delay,
            "StrategyRunner running"
        );
        loop {
            step(self.run_id, self.strategy.as_mut(), &self.markets).await?;
            tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
        }
    }
}

pub mod config;
pub mod double_crossover;
pub mod orders;
pub mod registry;
pub mod signal;

use std::sync::Arc;

use async_trait::async_trait;

use common::{Market, Pair, Result};

pub use config::{MarketConfig, RunConfig, RunFileConfig};
pub use double_crossover::{DoubleCrossover, DoubleCrossoverConfig};
pub use orders::OrderLifecycle;
pub use registry::{StrategyDeps, StrategyFactory, StrategyRegistry};
pub use signal::{CrossoverTracker, Signal};

/// All strategy implementations must satisfy this trait.
///
/// A strategy owns its state exclusively; the runner calls `tick` strictly
/// sequentially and waits `seconds_delay_between_ticks` in between.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Registry name of this strategy.
    fn name(&self) -> &str;

    /// The pair this strategy was bound to at construction.
    fn pair(&self) -> &Pair;

    fn seconds_delay_between_ticks(&self) -> i64;

    /// Evaluate the market once and act on any signal.
    ///
    /// `NotEnoughBalanceToPerformOrder` is handled internally; every other
    /// error ends the run.
    async fn tick(&mut self, markets: &[Arc<dyn Market>]) -> Result<()>;
}

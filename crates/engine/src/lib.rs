pub mod launcher;
pub mod plugins;
pub mod replayer;
pub mod runner;

pub use launcher::{Launcher, RunHandle};
pub use plugins::{MarketDeps, MarketFactory, MarketRegistry};
pub use replayer::{ReplaySummary, StrategyReplayer};
pub use runner::StrategyRunner;

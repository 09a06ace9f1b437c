use std::sync::Arc;

use common::{CandleStorage, Clock, Market, RawConfig, Registry, Result};
use paper::PaperMarket;

/// What a market factory receives when a run binds it.
pub struct MarketDeps<'a> {
    pub market_name: &'a str,
    pub configuration: &'a RawConfig,
    pub candles: Arc<dyn CandleStorage>,
    pub clock: Arc<dyn Clock>,
}

pub type MarketFactory = fn(MarketDeps<'_>) -> Result<Arc<dyn Market>>;

/// Market plugin name → constructor.
pub struct MarketRegistry {
    factories: Registry<MarketFactory>,
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl MarketRegistry {
    pub fn empty() -> Self {
        Self {
            factories: Registry::new("market"),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("paper", build_paper);
        registry
    }

    pub fn register(&mut self, name: &str, factory: MarketFactory) -> &mut Self {
        self.factories.register(name, factory);
        self
    }

    pub fn build(&self, plugin_name: &str, deps: MarketDeps<'_>) -> Result<Arc<dyn Market>> {
        let factory = self.factories.get(plugin_name)?;
        factory(deps)
    }
}

fn build_paper(deps: MarketDeps<'_>) -> Result<Arc<dyn Market>> {
    let market = PaperMarket::from_config(deps.market_name, deps.configuration, deps.candles, deps.clock)?;
    Ok(Arc::new(market))
}

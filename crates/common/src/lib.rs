pub mod candle;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod interval;
pub mod market;
pub mod order;
pub mod pair;
pub mod registry;
pub mod run;
pub mod schema;
pub mod storage;
pub mod types;

pub use candle::{Candle, CandleField, CandleSize, CandleUnit};
pub use clock::{Clock, FrozenClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{BroadcastEmitter, EventEmitter, NullEmitter, PlatformEvent};
pub use interval::DateTimeInterval;
pub use market::Market;
pub use order::{Order, OrderRecord, OrderTemplate};
pub use pair::Pair;
pub use registry::Registry;
pub use run::{PortfolioSnapshot, RawConfig, StrategyRun, StrategyRunMarket};
pub use schema::{ConfigField, ConfigSchema, ConfigValue, FieldKind, TypedConfig};
pub use storage::{CandleStorage, OrderFilter, OrderStorage, PortfolioSnapshotStorage, StrategyRunStorage};
pub use types::*;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{OrderStatus, Pair};

#[derive(Debug, Error)]
pub enum Error {
    // ─── User / configuration errors ─────────────────────────────────────────
    #[error("Strategy configuration error: {0}")]
    StrategyConfiguration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No {kind} plugin registered under name '{name}'")]
    PluginNotFound { kind: &'static str, name: String },

    // ─── Market rejections ───────────────────────────────────────────────────
    #[error("Not enough balance to perform {pair} order of {quantity}: {reason}")]
    NotEnoughBalanceToPerformOrder {
        pair: Pair,
        quantity: Decimal,
        reason: String,
    },

    #[error("Market '{market}' rejected order: {reason}")]
    MarketOrder { market: String, reason: String },

    #[error("Pair {pair} does not exist on market '{market}'")]
    MarketPairDoesNotExist { market: String, pair: Pair },

    // ─── Storage ─────────────────────────────────────────────────────────────
    #[error("No candles for {pair} on market '{market}' in storage")]
    NoCandlesForMarketInStorage { market: String, pair: Pair },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // ─── Domain value construction ───────────────────────────────────────────
    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    #[error("Invalid candle size: {0}")]
    InvalidCandleSize(String),

    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidOrderTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    // ─── Plumbing ────────────────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Rejections a strategy is expected to survive: the loop logs and carries on.
    pub fn is_not_enough_balance(&self) -> bool {
        matches!(self, Error::NotEnoughBalanceToPerformOrder { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

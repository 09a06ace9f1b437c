use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// The stablecoin the platform treats as an alias of USD.
pub const USD_ALIAS: &str = "USDT";

/// Symbols that quote in dollars. None of them may be the traded (market) side.
const USD_EQUIVALENTS: &[&str] = &["USD", USD_ALIAS];

/// A tradable currency combination: prices are expressed in `base`, the
/// asset bought and sold is `market_currency`. `USD_BTC` buys BTC with USD.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    base_currency: String,
    market_currency: String,
}

impl Pair {
    pub fn new(base_currency: impl Into<String>, market_currency: impl Into<String>) -> Result<Self> {
        let base_currency = base_currency.into().to_uppercase();
        let market_currency = market_currency.into().to_uppercase();

        if base_currency.is_empty() || market_currency.is_empty() {
            return Err(Error::InvalidPair("currency symbols must not be empty".into()));
        }
        if base_currency.contains('_') || market_currency.contains('_') {
            return Err(Error::InvalidPair(format!(
                "currency symbols must not contain '_': {base_currency}, {market_currency}"
            )));
        }
        if base_currency == USD_ALIAS {
            return Err(Error::InvalidPair(format!(
                "{USD_ALIAS} is an alias of USD, use USD as the base currency"
            )));
        }
        if USD_EQUIVALENTS.contains(&market_currency.as_str()) {
            return Err(Error::InvalidPair(format!(
                "market currency {market_currency} is a USD equivalent"
            )));
        }

        Ok(Self {
            base_currency,
            market_currency,
        })
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn market_currency(&self) -> &str {
        &self.market_currency
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base_currency, self.market_currency)
    }
}

impl FromStr for Pair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (base, market) = s
            .split_once('_')
            .ok_or_else(|| Error::InvalidPair(format!("expected BASE_MARKET, got '{s}'")))?;
        Pair::new(base, market)
    }
}

impl Serialize for Pair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_btc_is_valid_and_serializes_with_underscore() {
        let pair = Pair::new("USD", "BTC").unwrap();
        assert_eq!(pair.to_string(), "USD_BTC");
        assert_eq!(serde_json::to_string(&pair).unwrap(), "\"USD_BTC\"");
    }

    #[test]
    fn usdt_base_is_rejected() {
        assert!(matches!(Pair::new("USDT", "BTC"), Err(Error::InvalidPair(_))));
    }

    #[test]
    fn usd_equivalent_market_currency_is_rejected() {
        assert!(matches!(Pair::new("USD", "USDT"), Err(Error::InvalidPair(_))));
        assert!(matches!(Pair::new("BTC", "USD"), Err(Error::InvalidPair(_))));
    }

    #[test]
    fn parses_back_from_display_form() {
        let pair: Pair = "usd_eth".parse().unwrap();
        assert_eq!(pair, Pair::new("USD", "ETH").unwrap());
        assert!("USDBTC".parse::<Pair>().is_err());
    }
}

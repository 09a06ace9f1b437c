use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Pair, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CandleUnit {
    Minute,
    Hour,
    Day,
}

impl CandleUnit {
    fn seconds(self) -> i64 {
        match self {
            CandleUnit::Minute => 60,
            CandleUnit::Hour => 3_600,
            CandleUnit::Day => 86_400,
        }
    }

    /// How many units fit in the next larger unit. Multiples must divide it.
    fn natural_range(self) -> u32 {
        match self {
            CandleUnit::Minute => 60,
            CandleUnit::Hour => 24,
            CandleUnit::Day => 1,
        }
    }

    fn suffix(self) -> char {
        match self {
            CandleUnit::Minute => 'm',
            CandleUnit::Hour => 'h',
            CandleUnit::Day => 'd',
        }
    }
}

/// Width of a candle bucket, e.g. 15 minutes or 4 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandleSize {
    unit: CandleUnit,
    multiple: u32,
}

impl CandleSize {
    pub const ONE_MINUTE: CandleSize = CandleSize { unit: CandleUnit::Minute, multiple: 1 };
    pub const ONE_HOUR: CandleSize = CandleSize { unit: CandleUnit::Hour, multiple: 1 };
    pub const ONE_DAY: CandleSize = CandleSize { unit: CandleUnit::Day, multiple: 1 };

    pub fn new(unit: CandleUnit, multiple: u32) -> Result<Self> {
        let range = unit.natural_range();
        if multiple == 0 || range % multiple != 0 {
            return Err(Error::InvalidCandleSize(format!(
                "{multiple}{} does not evenly divide {range}",
                unit.suffix()
            )));
        }
        Ok(Self { unit, multiple })
    }

    pub fn unit(&self) -> CandleUnit {
        self.unit
    }

    pub fn multiple(&self) -> u32 {
        self.multiple
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    pub fn seconds(&self) -> i64 {
        self.unit.seconds() * i64::from(self.multiple)
    }

    /// Floor `t` to the start of the bucket containing it.
    ///
    /// Every valid size divides a day, so flooring the unix timestamp lands on
    /// the same boundary as flooring the wall-clock fields.
    pub fn truncate(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let ts = t.timestamp();
        let floored = ts - ts.rem_euclid(self.seconds());
        DateTime::from_timestamp(floored, 0).unwrap_or(t)
    }

    pub fn is_aligned(&self, t: DateTime<Utc>) -> bool {
        self.truncate(t) == t
    }
}

impl fmt::Display for CandleSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.multiple, self.unit.suffix())
    }
}

impl FromStr for CandleSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidCandleSize(format!("expected e.g. '15m', '1h', '1d', got '{s}'"));
        let unit = match s.chars().last().ok_or_else(invalid)? {
            'm' => CandleUnit::Minute,
            'h' => CandleUnit::Hour,
            'd' => CandleUnit::Day,
            _ => return Err(invalid()),
        };
        let multiple: u32 = s[..s.len() - 1].parse().map_err(|_| invalid())?;
        CandleSize::new(unit, multiple)
    }
}

impl Serialize for CandleSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CandleSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Price field of a candle that can be averaged over an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleField {
    Open,
    High,
    Low,
    Close,
}

impl fmt::Display for CandleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandleField::Open => write!(f, "open"),
            CandleField::High => write!(f, "high"),
            CandleField::Low => write!(f, "low"),
            CandleField::Close => write!(f, "close"),
        }
    }
}

/// One OHLC bucket of a pair on a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CandleRecord")]
pub struct Candle {
    market_name: String,
    pair: Pair,
    time: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    candle_size: CandleSize,
}

/// Unvalidated wire form of a [`Candle`].
#[derive(Deserialize)]
struct CandleRecord {
    market_name: String,
    pair: Pair,
    time: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    candle_size: CandleSize,
}

impl TryFrom<CandleRecord> for Candle {
    type Error = Error;

    fn try_from(r: CandleRecord) -> Result<Self> {
        Candle::new(r.market_name, r.pair, r.time, r.open, r.high, r.low, r.close, r.candle_size)
    }
}

impl Candle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_name: impl Into<String>,
        pair: Pair,
        time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        candle_size: CandleSize,
    ) -> Result<Self> {
        if !candle_size.is_aligned(time) {
            return Err(Error::InvalidCandle(format!(
                "time {time} is not aligned to a {candle_size} bucket"
            )));
        }
        if low > high {
            return Err(Error::InvalidCandle(format!("low {low} is above high {high}")));
        }
        Ok(Self {
            market_name: market_name.into(),
            pair,
            time,
            open,
            high,
            low,
            close,
            candle_size,
        })
    }

    pub fn market_name(&self) -> &str {
        &self.market_name
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn open(&self) -> Decimal {
        self.open
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn low(&self) -> Decimal {
        self.low
    }

    pub fn close(&self) -> Decimal {
        self.close
    }

    pub fn candle_size(&self) -> CandleSize {
        self.candle_size
    }

    pub fn field(&self, field: CandleField) -> Decimal {
        match field {
            CandleField::Open => self.open,
            CandleField::High => self.high,
            CandleField::Low => self.low,
            CandleField::Close => self.close,
        }
    }

    pub fn average_price(&self) -> Decimal {
        (self.low + self.high) / Decimal::TWO
    }
}

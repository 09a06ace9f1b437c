use std::collections::BTreeMap;

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::warn;

use crate::{CandleSize, Error, RawConfig, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Decimal,
    CandleSize,
    /// `"90s"`, `"15m"`, `"4h"`, `"2d"`.
    Duration,
}

/// One declared configuration key of a strategy or market plugin.
#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    pub key: &'static str,
    pub kind: FieldKind,
    pub title: &'static str,
    pub default: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Decimal(Decimal),
    CandleSize(CandleSize),
    Duration(Duration),
}

/// Declared fields of a plugin, used to coerce raw string configuration once,
/// at construction time.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSchema {
    owner: &'static str,
    fields: &'static [ConfigField],
}

impl ConfigSchema {
    pub const fn new(owner: &'static str, fields: &'static [ConfigField]) -> Self {
        Self { owner, fields }
    }

    pub fn fields(&self) -> &'static [ConfigField] {
        self.fields
    }

    /// Coerce `raw` into typed values.
    ///
    /// Unknown keys are dropped with a warning. A declared key that is neither
    /// given nor defaulted, or that fails to parse, is an error.
    pub fn coerce(&self, raw: &RawConfig) -> Result<TypedConfig> {
        for key in raw.keys() {
            if !self.fields.iter().any(|f| f.key == key) {
                warn!(owner = self.owner, key = %key, "Dropping unrecognized configuration key");
            }
        }

        let mut values = BTreeMap::new();
        for field in self.fields {
            let text = raw
                .get(field.key)
                .map(String::as_str)
                .or(field.default)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "{}: missing required key '{}' ({})",
                        self.owner, field.key, field.title
                    ))
                })?;
            let value = parse_value(field.kind, text).map_err(|reason| {
                Error::Config(format!("{}: invalid value '{text}' for '{}': {reason}", self.owner, field.key))
            })?;
            values.insert(field.key, value);
        }

        Ok(TypedConfig {
            owner: self.owner,
            values,
        })
    }
}

fn parse_value(kind: FieldKind, text: &str) -> std::result::Result<ConfigValue, String> {
    let text = text.trim();
    match kind {
        FieldKind::String => Ok(ConfigValue::String(text.to_string())),
        FieldKind::Int => text.parse().map(ConfigValue::Int).map_err(|e| e.to_string()),
        FieldKind::Decimal => text.parse().map(ConfigValue::Decimal).map_err(|e| e.to_string()),
        FieldKind::CandleSize => text.parse().map(ConfigValue::CandleSize).map_err(|e: Error| e.to_string()),
        FieldKind::Duration => parse_duration(text).map(ConfigValue::Duration),
    }
}

pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let invalid = || format!("expected a duration like '90s', '15m', '4h' or '2d', got '{text}'");
    let unit = text.chars().last().ok_or_else(invalid)?;
    let amount: i64 = text[..text.len() - unit.len_utf8()].parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }
    let duration = match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => return Err(invalid()),
    };
    duration.ok_or_else(|| format!("duration '{text}' is out of range"))
}

/// Coerced configuration. Accessors fail only on keys the schema never declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedConfig {
    owner: &'static str,
    values: BTreeMap<&'static str, ConfigValue>,
}

impl TypedConfig {
    fn get(&self, key: &str) -> Result<&ConfigValue> {
        self.values
            .get(key)
            .ok_or_else(|| Error::Config(format!("{}: key '{key}' is not declared", self.owner)))
    }

    fn mismatch(&self, key: &str, expected: &str) -> Error {
        Error::Config(format!("{}: key '{key}' is not a {expected}", self.owner))
    }

    pub fn string(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            ConfigValue::String(v) => Ok(v),
            _ => Err(self.mismatch(key, "string")),
        }
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            ConfigValue::Int(v) => Ok(*v),
            _ => Err(self.mismatch(key, "integer")),
        }
    }

    pub fn decimal(&self, key: &str) -> Result<Decimal> {
        match self.get(key)? {
            ConfigValue::Decimal(v) => Ok(*v),
            _ => Err(self.mismatch(key, "decimal")),
        }
    }

    pub fn candle_size(&self, key: &str) -> Result<CandleSize> {
        match self.get(key)? {
            ConfigValue::CandleSize(v) => Ok(*v),
            _ => Err(self.mismatch(key, "candle size")),
        }
    }

    pub fn duration(&self, key: &str) -> Result<Duration> {
        match self.get(key)? {
            ConfigValue::Duration(v) => Ok(*v),
            _ => Err(self.mismatch(key, "duration")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const FIELDS: &[ConfigField] = &[
        ConfigField { key: "window", kind: FieldKind::Duration, title: "Window", default: None },
        ConfigField { key: "fee", kind: FieldKind::Decimal, title: "Fee", default: Some("0.0025") },
        ConfigField { key: "size", kind: FieldKind::CandleSize, title: "Candle size", default: Some("1m") },
        ConfigField { key: "retries", kind: FieldKind::Int, title: "Retries", default: Some("3") },
    ];
    const SCHEMA: ConfigSchema = ConfigSchema::new("test", FIELDS);

    fn raw(pairs: &[(&str, &str)]) -> RawConfig {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn coerces_given_values_and_fills_defaults() {
        let config = SCHEMA.coerce(&raw(&[("window", "4h"), ("size", "15m")])).unwrap();
        assert_eq!(config.duration("window").unwrap(), Duration::hours(4));
        assert_eq!(config.decimal("fee").unwrap(), dec!(0.0025));
        assert_eq!(config.candle_size("size").unwrap().to_string(), "15m");
        assert_eq!(config.int("retries").unwrap(), 3);
    }

    #[test]
    fn unknown_keys_are_dropped_not_rejected() {
        let config = SCHEMA.coerce(&raw(&[("window", "1h"), ("colour", "blue")])).unwrap();
        assert!(config.string("colour").is_err());
    }

    #[test]
    fn missing_required_key_is_an_error() {
        assert!(matches!(SCHEMA.coerce(&raw(&[])), Err(Error::Config(_))));
    }

    #[test]
    fn unparsable_values_are_errors() {
        assert!(SCHEMA.coerce(&raw(&[("window", "soon")])).is_err());
        assert!(SCHEMA.coerce(&raw(&[("window", "1h"), ("size", "7m")])).is_err());
        assert!(SCHEMA.coerce(&raw(&[("window", "1h"), ("fee", "cheap")])).is_err());
    }

    #[test]
    fn accessor_type_mismatch_is_reported() {
        let config = SCHEMA.coerce(&raw(&[("window", "1h")])).unwrap();
        assert!(config.decimal("window").is_err());
    }

    #[test]
    fn durations_parse_all_units() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::seconds(90));
        assert_eq!(parse_duration("2d").unwrap(), Duration::days(2));
        assert!(parse_duration("0m").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn oversized_durations_are_errors() {
        assert!(parse_duration("9999999999999d").is_err());
        assert!(parse_duration("9223372036854775807s").is_err());
        assert!(matches!(
            SCHEMA.coerce(&raw(&[("window", "9999999999999d")])),
            Err(Error::Config(_))
        ));
    }
}

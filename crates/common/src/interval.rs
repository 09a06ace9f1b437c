use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A time range with optional bounds; `None` means unbounded on that side.
///
/// Bounds are `DateTime<Utc>`, so the timezone requirement is carried by the
/// type. Membership is strict on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateTimeInterval {
    pub since: Option<DateTime<Utc>>,
    pub till: Option<DateTime<Utc>>,
}

impl DateTimeInterval {
    pub fn new(since: Option<DateTime<Utc>>, till: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(since), Some(till)) = (since, till) {
            if since > till {
                return Err(Error::InvalidInterval(format!("{since} is after {till}")));
            }
        }
        Ok(Self { since, till })
    }

    pub fn between(since: DateTime<Utc>, till: DateTime<Utc>) -> Result<Self> {
        Self::new(Some(since), Some(till))
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| since < t) && self.till.map_or(true, |till| t < till)
    }
}

impl fmt::Display for DateTimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<DateTime<Utc>>| b.map_or_else(|| "∞".to_string(), |t| t.to_rfc3339());
        write!(f, "({}, {})", bound(self.since), bound(self.till))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn contains_is_strict_on_both_ends() {
        let interval = DateTimeInterval::between(at(1), at(3)).unwrap();
        assert!(!interval.contains(at(1)));
        assert!(interval.contains(at(2)));
        assert!(!interval.contains(at(3)));
    }

    #[test]
    fn missing_bounds_are_unbounded() {
        let open_start = DateTimeInterval::new(None, Some(at(3))).unwrap();
        assert!(open_start.contains(at(0)));
        assert!(DateTimeInterval::unbounded().contains(at(23)));
    }

    #[test]
    fn reversed_bounds_are_rejected() {
        assert!(DateTimeInterval::between(at(3), at(1)).is_err());
    }
}

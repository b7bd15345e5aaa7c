use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MICROS_PER_SEC: i64 = 1_000_000;

/// Seconds digits accepted when parsing; keeps `as_micros` within `i64`.
const MAX_SECS_DIGITS: usize = 12;

/// Platform message timestamp (`"1712345678.123456"`).
///
/// Held as fixed-point seconds + microseconds so that ordering and the
/// exclusive cursor boundary never go through a float parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageTs {
    secs: i64,
    micros: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid message timestamp '{0}'")]
pub struct InvalidTs(pub String);

impl MessageTs {
    pub fn new(secs: i64, micros: u32) -> Self {
        debug_assert!(micros < 1_000_000);
        Self { secs, micros }
    }

    pub fn from_micros(total: i64) -> Self {
        Self {
            secs: total.div_euclid(MICROS_PER_SEC),
            micros: total.rem_euclid(MICROS_PER_SEC) as u32,
        }
    }

    /// Total microseconds, saturating at the `i64` bounds.
    pub fn as_micros(&self) -> i64 {
        self.secs
            .saturating_mul(MICROS_PER_SEC)
            .saturating_add(self.micros as i64)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::from_micros(dt.timestamp_micros())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.secs, self.micros * 1_000)
            .single()
            .unwrap_or_default()
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }
}

impl FromStr for MessageTs {
    type Err = InvalidTs;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));

        if whole.is_empty()
            || whole.len() > MAX_SECS_DIGITS
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || frac.len() > 6
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidTs(s.to_string()));
        }

        let secs: i64 = whole.parse().map_err(|_| InvalidTs(s.to_string()))?;
        let micros = if frac.is_empty() {
            0
        } else {
            // "5" means 500000 micros, not 5
            format!("{:0<6}", frac)
                .parse::<u32>()
                .map_err(|_| InvalidTs(s.to_string()))?
        };

        Ok(Self { secs, micros })
    }
}

impl fmt::Display for MessageTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}

impl Serialize for MessageTs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageTs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_canonical_form() {
        let ts: MessageTs = "1712345678.000123".parse().unwrap();
        assert_eq!(ts.secs(), 1712345678);
        assert_eq!(ts.to_string(), "1712345678.000123");

        let short: MessageTs = "1712345678.5".parse().unwrap();
        assert_eq!(short.to_string(), "1712345678.500000");

        let bare: MessageTs = "1712345678".parse().unwrap();
        assert_eq!(bare.to_string(), "1712345678.000000");
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<MessageTs>().is_err());
        assert!("abc.123".parse::<MessageTs>().is_err());
        assert!("12.1234567".parse::<MessageTs>().is_err());
        assert!("-1.5".parse::<MessageTs>().is_err());
        assert!(".5".parse::<MessageTs>().is_err());
    }

    #[test]
    fn oversized_seconds_are_rejected() {
        assert!("999999999999.999999".parse::<MessageTs>().is_ok());
        assert!("17123456781234.000001".parse::<MessageTs>().is_err());
        assert!("9223372036854775807.0".parse::<MessageTs>().is_err());

        let huge = MessageTs::new(i64::MAX / 2, 999_999);
        assert_eq!(huge.as_micros(), i64::MAX);
    }

    #[test]
    fn orders_adjacent_micros_exactly() {
        // Adjacent values that collapse to the same f64
        let a: MessageTs = "171234567812.000001".parse().unwrap();
        let b: MessageTs = "171234567812.000002".parse().unwrap();
        assert!(a < b);
        assert_eq!(
            "171234567812.000001".parse::<f64>().unwrap(),
            "171234567812.000002".parse::<f64>().unwrap()
        );
    }

    #[test]
    fn micros_and_datetime_conversions_agree() {
        let ts: MessageTs = "1700000000.250000".parse().unwrap();
        assert_eq!(MessageTs::from_micros(ts.as_micros()), ts);
        assert_eq!(MessageTs::from_datetime(ts.to_datetime()), ts);
    }

    #[test]
    fn serde_uses_string_form() {
        let ts: MessageTs = "1700000000.000001".parse().unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"1700000000.000001\"");
        let back: MessageTs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}

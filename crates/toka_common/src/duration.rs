//! Human-readable durations and cache time-to-live values.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A duration written the way operators write it in config files.
///
/// Supports parsing from strings like "500ms", "90s", "5m", "1h", "2d", and
/// bare numeric values (interpreted as seconds). Displays using the largest
/// unit that divides the value evenly.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HumanDuration(Duration);

impl HumanDuration {
    /// Wraps a standard duration.
    pub const fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// Creates a duration from whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Returns the wrapped standard duration.
    pub const fn as_duration(&self) -> Duration {
        self.0
    }

    /// Returns true if the duration is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for HumanDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.0
    }
}

impl fmt::Debug for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HumanDuration({self})")
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0.as_millis();
        if ms == 0 {
            return f.write_str("0s");
        }
        if ms % 1000 != 0 {
            return write!(f, "{ms}ms");
        }
        let secs = self.0.as_secs();
        if secs % 86_400 == 0 {
            write!(f, "{}d", secs / 86_400)
        } else if secs % 3_600 == 0 {
            write!(f, "{}h", secs / 3_600)
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

/// Error type for parsing duration strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration: '{input}' (expected e.g. \"500ms\", \"90s\", \"5m\", \"1h\")")]
pub struct ParseDurationError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for HumanDuration {
    type Err = ParseDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseDurationError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        // "ms" must be tried before "s" and "m"
        let (num, unit_secs) = if let Some(num) = lower.strip_suffix("ms") {
            (num, 0.001)
        } else if let Some(num) = lower.strip_suffix('s') {
            (num, 1.0)
        } else if let Some(num) = lower.strip_suffix('m') {
            (num, 60.0)
        } else if let Some(num) = lower.strip_suffix('h') {
            (num, 3_600.0)
        } else if let Some(num) = lower.strip_suffix('d') {
            (num, 86_400.0)
        } else {
            (lower.as_str(), 1.0)
        };

        let val: f64 = num.trim().parse().map_err(|_| err())?;
        if !val.is_finite() || val < 0.0 {
            return Err(err());
        }
        Duration::try_from_secs_f64(val * unit_secs)
            .map(Self)
            .map_err(|_| err())
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a duration string like \"90s\" or a number of seconds")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<HumanDuration, E> {
                Ok(HumanDuration::from_secs(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<HumanDuration, E> {
                u64::try_from(v)
                    .map(HumanDuration::from_secs)
                    .map_err(|_| E::custom("duration cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<HumanDuration, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

/// How long a cached asset stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Cached entries never expire.
    #[default]
    Forever,
    /// Entries older than this are treated as absent.
    After(Duration),
}

impl Ttl {
    /// Returns true if an entry of the given age is still fresh.
    pub fn is_fresh(&self, age: Duration) -> bool {
        match self {
            Ttl::Forever => true,
            Ttl::After(limit) => age <= *limit,
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Forever => f.write_str("forever"),
            Ttl::After(d) => write!(f, "{}", HumanDuration(*d)),
        }
    }
}

impl FromStr for Ttl {
    type Err = ParseDurationError;

    /// "forever" and a zero duration both mean no expiry.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("forever") {
            return Ok(Ttl::Forever);
        }
        let d: HumanDuration = s.parse()?;
        Ok(Ttl::from(d))
    }
}

impl From<HumanDuration> for Ttl {
    fn from(value: HumanDuration) -> Self {
        if value.is_zero() {
            Ttl::Forever
        } else {
            Ttl::After(value.0)
        }
    }
}

impl Serialize for Ttl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ttl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TtlVisitor;

        impl Visitor<'_> for TtlVisitor {
            type Value = Ttl;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"forever\", a duration string, or a number of seconds")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Ttl, E> {
                Ok(Ttl::from(HumanDuration::from_secs(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Ttl, E> {
                u64::try_from(v)
                    .map(|secs| Ttl::from(HumanDuration::from_secs(secs)))
                    .map_err(|_| E::custom("ttl cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Ttl, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(TtlVisitor)
    }
}

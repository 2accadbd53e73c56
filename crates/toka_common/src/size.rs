//! Byte-size values with unit parsing and display.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// A size in bytes.
///
/// Supports parsing from strings like "500MB", "256MiB", "64KB", "1GiB", and
/// bare numeric values (interpreted as bytes). `KB`/`MB`/`GB` are read as
/// binary multiples, the same as their `KiB`/`MiB`/`GiB` spellings.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Creates a size from a byte count.
    pub const fn bytes(n: u64) -> Self {
        Self(n)
    }

    /// Creates a size from a number of mebibytes.
    pub const fn mib(n: u64) -> Self {
        Self(n * MIB)
    }

    /// Returns the size in bytes.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteSize({self})")
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n >= GIB && n % GIB == 0 {
            write!(f, "{}GiB", n / GIB)
        } else if n >= MIB && n % MIB == 0 {
            write!(f, "{}MiB", n / MIB)
        } else if n >= KIB && n % KIB == 0 {
            write!(f, "{}KiB", n / KIB)
        } else {
            write!(f, "{n}B")
        }
    }
}

/// Error type for parsing size strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid size: '{input}' (expected e.g. \"500MB\", \"256MiB\", \"1048576\")")]
pub struct ParseSizeError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for ByteSize {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseSizeError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let units: [(&str, u64); 7] = [
            ("gib", GIB),
            ("mib", MIB),
            ("kib", KIB),
            ("gb", GIB),
            ("mb", MIB),
            ("kb", KIB),
            ("b", 1),
        ];
        for (suffix, scale) in units {
            if let Some(num) = lower.strip_suffix(suffix) {
                let val: u64 = num.trim().parse().map_err(|_| err())?;
                return val.checked_mul(scale).map(Self).ok_or_else(err);
            }
        }

        // Bare number is a byte count
        s.parse().map(Self).map_err(|_| err())
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeVisitor;

        impl Visitor<'_> for SizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a size string like \"500MB\" or a number of bytes")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ByteSize, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ByteSize, E> {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("size cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ByteSize, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}

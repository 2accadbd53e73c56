//! SHA-256 digests for verifying downloaded release artifacts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A 256-bit SHA-256 digest.
///
/// Parses from the forms release manifests publish: `sha256:<hex>`, bare hex,
/// and checksum-file lines of the form `<hex>  <filename>`. Hex is accepted in
/// either case and always displayed lowercase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Computes the digest of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Error type for parsing digest strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sha256 digest '{input}': {reason}")]
pub struct ParseDigestError {
    /// The input string that failed to parse.
    pub input: String,
    /// Why the input was rejected.
    pub reason: &'static str,
}

impl FromStr for Sha256Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseDigestError {
            input: s.to_string(),
            reason,
        };

        // `<hex>  <filename>` checksum lines keep only the first field
        let first = s.split_whitespace().next().ok_or_else(|| err("empty"))?;
        let hex_part = match first.split_once(':') {
            Some((algo, rest)) if algo.eq_ignore_ascii_case("sha256") => rest,
            Some(_) => return Err(err("unsupported algorithm prefix")),
            None => first,
        };
        if hex_part.len() != 64 {
            return Err(err("expected 64 hex characters"));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_part.to_ascii_lowercase(), &mut bytes)
            .map_err(|_| err("not valid hex"))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = ParseDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sha256Digest> for String {
    fn from(value: Sha256Digest) -> Self {
        value.to_hex()
    }
}

//! ABI compatibility gate for loaded libraries.

use std::fmt;

use semver::{Version, VersionReq};
use tracing::debug;

use crate::error::NativeError;

/// Versions this crate can call into.
pub const ABI_CONSTRAINT: &str = "^0.1";

/// A semantic-version range a library must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiConstraint {
    raw: String,
    req: VersionReq,
}

impl AbiConstraint {
    /// Parses a version requirement such as `^0.1`.
    pub fn parse(raw: &str) -> Result<Self, semver::Error> {
        Ok(Self {
            raw: raw.to_string(),
            req: VersionReq::parse(raw)?,
        })
    }

    /// Returns true if `version` satisfies the range.
    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }
}

impl Default for AbiConstraint {
    fn default() -> Self {
        Self {
            raw: ABI_CONSTRAINT.to_string(),
            req: VersionReq {
                comparators: vec![semver::Comparator {
                    op: semver::Op::Caret,
                    major: 0,
                    minor: Some(1),
                    patch: None,
                    pre: semver::Prerelease::EMPTY,
                }],
            },
        }
    }
}

impl fmt::Display for AbiConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Fails closed on libraries outside the supported ABI range.
#[derive(Debug, Clone, Default)]
pub struct AbiGate {
    constraint: AbiConstraint,
}

impl AbiGate {
    /// Gate enforcing `constraint`.
    pub fn new(constraint: AbiConstraint) -> Self {
        Self { constraint }
    }

    /// The enforced range.
    pub fn constraint(&self) -> &AbiConstraint {
        &self.constraint
    }

    /// Checks a self-reported version string.
    pub fn check(&self, reported: &str) -> Result<Version, NativeError> {
        let trimmed = reported.trim();
        let version = Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).map_err(|e| {
            NativeError::InvalidVersion {
                version: reported.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !self.constraint.matches(&version) {
            return Err(NativeError::Incompatible {
                version: version.to_string(),
                constraint: self.constraint.to_string(),
            });
        }
        debug!(%version, constraint = %self.constraint, "library ABI compatible");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_parsed_literal() {
        let parsed = AbiConstraint::parse(ABI_CONSTRAINT).unwrap();
        assert_eq!(AbiConstraint::default(), parsed);
        assert_eq!(parsed.to_string(), "^0.1");
    }

    #[test]
    fn compatible_versions_pass() {
        let gate = AbiGate::default();
        for v in ["0.1.0", "0.1.5", "0.1.7", "v0.1.2"] {
            assert!(gate.check(v).is_ok(), "{v} should pass");
        }
    }

    #[test]
    fn incompatible_versions_fail_with_remediation() {
        let gate = AbiGate::default();
        for v in ["1.0.0", "0.2.0", "0.0.9"] {
            let err = gate.check(v).unwrap_err();
            let msg = err.to_string();
            assert!(matches!(err, NativeError::Incompatible { .. }));
            assert!(msg.contains(v), "{msg}");
            assert!(msg.contains("^0.1"), "{msg}");
            assert!(msg.contains("TOKENIZERS_LIB_PATH"), "{msg}");
        }
    }

    #[test]
    fn unparsable_version_is_fatal() {
        let err = AbiGate::default().check("not-a-version").unwrap_err();
        assert!(matches!(err, NativeError::InvalidVersion { .. }));
    }
}

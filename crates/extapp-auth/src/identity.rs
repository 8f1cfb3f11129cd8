//! Identity Registry
//!
//! Holds the single application identifier this deployment is authorized to
//! serve. Loaded once at startup and read-only afterwards, so it can be shared
//! across concurrent requests without locking.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Opaque identifier of an extension application
///
/// Comparison is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationIdentity(String);

impl ApplicationIdentity {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact, case-sensitive match against a candidate identifier
    ///
    /// Both sides are hashed to a fixed size before a constant-time
    /// comparison, so timing reveals neither the matching prefix length nor
    /// the expected identifier's length.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = blake3::hash(self.0.as_bytes());
        let provided = blake3::hash(candidate.as_bytes());
        expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }
}

impl fmt::Display for ApplicationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ApplicationIdentity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Source of the expected application identity
pub trait IdentityRegistry: Send + Sync + fmt::Debug {
    /// The one identity this deployment serves
    fn expected_identity(&self) -> &ApplicationIdentity;
}

/// Registry backed by a value fixed at construction time
#[derive(Debug, Clone)]
pub struct StaticIdentityRegistry {
    expected: ApplicationIdentity,
}

impl StaticIdentityRegistry {
    /// Create a registry for the given identity
    pub fn new(expected: impl Into<ApplicationIdentity>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl IdentityRegistry for StaticIdentityRegistry {
    fn expected_identity(&self) -> &ApplicationIdentity {
        &self.expected
    }
}

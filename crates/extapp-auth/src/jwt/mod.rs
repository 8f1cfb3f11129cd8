//! Signed assertion (JWT) verification
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │      AssertionVerifier       │  structure → algorithm → key → signature → time
//! └──────────────┬───────────────┘
//!                │ KeySource::resolve(issuer, header)
//!      ┌─────────┴─────────┐
//!      │      KeyRing      │  issuer → static PEM keys | JwksClient
//!      └───────────────────┘
//! ```
//!
//! Verification is all-or-nothing: the result is either
//! [`VerificationResult::Verified`] with the recovered claims or
//! [`VerificationResult::Rejected`] with a reason meant for logs only.

pub mod jwks;
pub mod keys;
pub mod verifier;

pub use jwks::JwksClient;
pub use keys::{KeyRing, KeySource, VerificationKey};
pub use verifier::AssertionVerifier;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audience claim: RFC 7519 allows a single string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    Single(String),
    /// Several audiences
    Many(Vec<String>),
}

impl Audience {
    /// Whether `candidate` is one of the audiences
    pub fn contains(&self, candidate: &str) -> bool {
        match self {
            Self::Single(aud) => aud == candidate,
            Self::Many(auds) => auds.iter().any(|aud| aud == candidate),
        }
    }
}

/// Claims recovered from a verified assertion
///
/// Registered claims per RFC 7519 Section 4.1; everything else the platform
/// asserts is kept in `additional`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer (iss)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Subject (sub) - the platform user the assertion speaks for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience (aud) - the application the assertion was minted for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration Time (exp) - Unix timestamp
    ///
    /// Always present on a verified assertion; the verifier requires it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Not Before (nbf) - Unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,

    /// Issued At (iat) - Unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// JWT ID (jti)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Additional claims not in RFC 7519
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

/// Why an assertion was rejected
///
/// Internal detail: the boundary collapses every reason to the same
/// unauthorized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// Not a three-part compact JWT with JSON header and claims
    Malformed,
    /// Signature missing, wrong, unsupported algorithm or key mismatch
    BadSignature,
    /// `exp` is in the past
    Expired,
    /// `nbf` is in the future
    NotYetValid,
    /// No key known for the issuer / key id
    UnknownKey,
    /// Issuer, audience or required claims do not check out
    InvalidClaims,
}

impl RejectionReason {
    /// Stable name for log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::UnknownKey => "unknown_key",
            Self::InvalidClaims => "invalid_claims",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying one assertion
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    /// Every check passed
    Verified(AssertionClaims),
    /// Some check failed; terminal for this attempt
    Rejected(RejectionReason),
}

impl VerificationResult {
    /// Whether verification succeeded
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    /// Rejection reason, if rejected
    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Self::Verified(_) => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

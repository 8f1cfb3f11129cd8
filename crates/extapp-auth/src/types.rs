//! Handshake data model
//!
//! Wire names follow the platform's camelCase JSON. Every type here is
//! transient: created per request, consumed once, never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Step 1 input: the application announcing itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    /// Claimed application identifier; absent is a client-input error
    #[serde(default)]
    pub app_id: Option<String>,
}

impl HandshakeRequest {
    /// Request claiming the given identifier
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
        }
    }
}

/// Step 2 input: the cross-bound token pair issued during step 1
///
/// Each token is meaningless alone; both must be presented together.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Token minted on the application side
    #[serde(default)]
    pub app_token: Option<String>,
    /// Token minted by the host platform
    #[serde(default)]
    pub symphony_token: Option<String>,
}

impl TokenPair {
    /// Pair from both halves
    pub fn new(app_token: impl Into<String>, symphony_token: impl Into<String>) -> Self {
        Self {
            app_token: Some(app_token.into()),
            symphony_token: Some(symphony_token.into()),
        }
    }

    /// Both halves, when both are present and non-empty
    pub fn complete(&self) -> Option<(&str, &str)> {
        match (self.app_token.as_deref(), self.symphony_token.as_deref()) {
            (Some(app), Some(platform)) if !app.is_empty() && !platform.is_empty() => {
                Some((app, platform))
            }
            _ => None,
        }
    }
}

// Manual Debug impl to prevent token exposure in logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("app_token", &self.app_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "symphony_token",
                &self.symphony_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Result of a successful handshake initiation
///
/// Opaque to this crate beyond being forwarded to the caller: fields the
/// platform adds are kept in `additional` and serialized back out.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    /// Application the handshake was opened for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Application-side token of the pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,
    /// Platform-side token of the pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symphony_token: Option<String>,
    /// Expiry of the pair (milliseconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
    /// Any other fields returned by the platform
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl fmt::Debug for AuthenticateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateResponse")
            .field("app_id", &self.app_id)
            .field("app_token", &self.app_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "symphony_token",
                &self.symphony_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expire_at", &self.expire_at)
            .field("additional_fields", &self.additional.len())
            .finish()
    }
}

/// Step 3 input: a compact signed assertion (JWT)
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAssertion {
    /// Compact serialization `header.claims.signature`
    #[serde(default, rename = "jwt")]
    pub raw: Option<String>,
}

impl SignedAssertion {
    /// Wrap a compact JWT
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("raw", &self.raw.as_ref().map(|r| format!("[{} bytes]", r.len())))
            .finish()
    }
}

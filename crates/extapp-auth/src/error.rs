//! Error types for the handshake core
//!
//! Client faults (a denied identity, a bad token pair, a forged assertion)
//! are expected outcomes and are modelled as values. The types here cover
//! the remaining failures: the platform being unreachable, a denied
//! handshake initiation, bad key material and bad configuration.

use std::fmt;

use thiserror::Error;

/// Why an upstream call could not produce an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableKind {
    /// The bounded timeout elapsed before the upstream answered
    Timeout,
    /// Connection, TLS or protocol failure
    Transport,
    /// The upstream answered with a server-side error status
    Status(u16),
    /// The upstream answered 2xx with a body we could not decode
    Decode,
}

impl fmt::Display for UnavailableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Transport => f.write_str("transport"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Decode => f.write_str("decode"),
        }
    }
}

/// Infrastructure fault: the platform (or a key-material source) could not
/// be reached or did not answer usefully.
///
/// Never retried inside this crate.
#[derive(Debug, Clone, Error)]
#[error("upstream unavailable ({kind}): {detail}")]
pub struct UpstreamUnavailable {
    /// Failure category
    pub kind: UnavailableKind,
    /// Human-readable detail for logs
    pub detail: String,
}

impl UpstreamUnavailable {
    /// Create a new upstream failure
    pub fn new(kind: UnavailableKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Timeout after the given bound
    pub fn timeout(bound: std::time::Duration) -> Self {
        Self::new(
            UnavailableKind::Timeout,
            format!("no answer within {}ms", bound.as_millis()),
        )
    }

    /// Classify a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            UnavailableKind::Timeout
        } else if err.is_decode() {
            UnavailableKind::Decode
        } else {
            UnavailableKind::Transport
        };
        Self::new(kind, err.to_string())
    }

    /// Whether this failure was a timeout
    pub fn is_timeout(&self) -> bool {
        self.kind == UnavailableKind::Timeout
    }
}

/// Failure to initiate a handshake
#[derive(Debug, Clone, Error)]
pub enum InitiateError {
    /// The platform refused the identity (unknown or unregistered application)
    #[error("platform denied authentication (status {status})")]
    AuthenticationDenied {
        /// HTTP status returned by the platform
        status: u16,
    },

    /// The platform could not be reached
    #[error(transparent)]
    Unavailable(#[from] UpstreamUnavailable),
}

/// Invalid verification key material
#[derive(Debug, Error)]
pub enum KeyError {
    /// The PEM could not be parsed for the requested algorithm
    #[error("invalid {algorithm:?} public key: {source}")]
    InvalidPem {
        /// Algorithm the key was meant for
        algorithm: jsonwebtoken::Algorithm,
        /// Underlying parser error
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// Symmetric algorithms are never accepted for assertion verification
    #[error("algorithm {0:?} is not an asymmetric signature algorithm")]
    SymmetricAlgorithm(jsonwebtoken::Algorithm),

    /// The JWK is published for encryption, not signing
    #[error("JWK {0:?} is not a signing key")]
    NotSigningKey(Option<String>),

    /// The JWK could not be converted into a decoding key
    #[error("invalid JWK: {0}")]
    InvalidJwk(#[source] jsonwebtoken::errors::Error),
}

/// Startup configuration errors (fatal)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No expected application identifier configured
    #[error("application.id must be configured")]
    MissingApplicationId,

    /// Platform base URL is not a valid URL
    #[error("invalid platform url '{url}': {source}")]
    InvalidUrl {
        /// Offending value
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// An issuer entry is incomplete
    #[error("issuer '{issuer}': {message}")]
    InvalidIssuer {
        /// Issuer the entry belongs to
        issuer: String,
        /// What is wrong
        message: String,
    },

    /// The assertion algorithm allowlist is empty or lists a symmetric algorithm
    #[error("invalid assertion.allowed_algorithms: {0}")]
    InvalidAlgorithms(String),

    /// A timeout is configured as zero, so every call would time out
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    /// No issuer is trusted, so no assertion could ever verify
    #[error("assertion.issuers must list at least one trusted issuer")]
    NoTrustedIssuers,

    /// Key material could not be loaded
    #[error("issuer '{issuer}': {source}")]
    Key {
        /// Issuer the key belongs to
        issuer: String,
        /// Key error
        #[source]
        source: KeyError,
    },

    /// Key file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: std::path::PathBuf,
        /// IO error
        #[source]
        source: std::io::Error,
    },

    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_is_classified() {
        let err = UpstreamUnavailable::timeout(Duration::from_millis(250));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_status_display() {
        let err = UpstreamUnavailable::new(UnavailableKind::Status(503), "maintenance");
        assert_eq!(err.to_string(), "upstream unavailable (status 503): maintenance");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_initiate_error_from_unavailable() {
        let err: InitiateError =
            UpstreamUnavailable::new(UnavailableKind::Transport, "connection refused").into();
        assert!(matches!(err, InitiateError::Unavailable(_)));
    }
}

//! Handshake configuration
//!
//! Deserialized once at startup (the server crate loads it with the `config`
//! crate) and turned into the runtime components by
//! [`HandshakeOrchestrator::from_config`](crate::HandshakeOrchestrator::from_config).
//! Every problem found here is fatal.

use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::identity::ApplicationIdentity;
use crate::jwt::verifier::DEFAULT_ALLOWED_ALGORITHMS;
use crate::jwt::{JwksClient, KeyRing, VerificationKey};
use crate::platform::HttpPlatformClient;

/// Default platform endpoint for handshake initiation
pub const DEFAULT_AUTHENTICATE_PATH: &str = "/v1/extension-app/authenticate";
/// Default platform endpoint for token-pair validation
pub const DEFAULT_VALIDATE_PATH: &str = "/v1/extension-app/tokens/validate";

fn default_authenticate_path() -> String {
    DEFAULT_AUTHENTICATE_PATH.to_string()
}

fn default_validate_path() -> String {
    DEFAULT_VALIDATE_PATH.to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_algorithms() -> Vec<Algorithm> {
    DEFAULT_ALLOWED_ALGORITHMS.to_vec()
}

fn default_cache_ttl_secs() -> u64 {
    600
}

/// Complete handshake configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeConfig {
    /// The application this deployment serves
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Host platform authentication service
    pub platform: PlatformConfig,
    /// Signed-assertion verification
    #[serde(default)]
    pub assertion: AssertionConfig,
}

/// Expected application identity
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationConfig {
    /// Expected application identifier; required
    #[serde(default)]
    pub id: Option<String>,
}

/// Platform endpoints and credentials
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Base URL, e.g. `https://platform.example.com`
    pub base_url: String,
    /// Path of the handshake initiation endpoint
    #[serde(default = "default_authenticate_path")]
    pub authenticate_path: String,
    /// Path of the token-pair validation endpoint
    #[serde(default = "default_validate_path")]
    pub validate_path: String,
    /// Bound on each platform call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bearer credential presented to the platform
    #[serde(default)]
    pub service_token: Option<SecretString>,
}

impl PlatformConfig {
    fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&url).map_err(|source| ConfigError::InvalidUrl { url, source })
    }

    /// Full handshake initiation URL
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidUrl`] when base URL and path do not form a URL.
    pub fn authenticate_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(&self.authenticate_path)
    }

    /// Full token-pair validation URL
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidUrl`] when base URL and path do not form a URL.
    pub fn validate_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(&self.validate_path)
    }

    /// Bound on each platform call
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject settings that would fail every platform call
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroTimeout`] when `timeout_ms` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("platform.timeout_ms"));
        }
        Ok(())
    }

    /// Build the HTTP platform client
    ///
    /// # Errors
    ///
    /// Invalid endpoint URLs or an HTTP client that cannot be built.
    pub fn build_client(&self) -> Result<HttpPlatformClient, ConfigError> {
        let client =
            HttpPlatformClient::new(self.authenticate_url()?, self.validate_url()?, self.timeout())?;
        Ok(match &self.service_token {
            Some(token) => client.with_service_token(token.clone()),
            None => client,
        })
    }
}

/// Assertion verification settings
#[derive(Debug, Clone, Deserialize)]
pub struct AssertionConfig {
    /// Required `aud` value; defaults to the application id
    #[serde(default)]
    pub expected_audience: Option<String>,
    /// Whether `aud` is checked at all
    #[serde(default = "default_true")]
    pub enforce_audience: bool,
    /// Accepted signature algorithms
    #[serde(default = "default_algorithms")]
    pub allowed_algorithms: Vec<Algorithm>,
    /// Bound on each key lookup
    #[serde(default = "default_timeout_ms")]
    pub key_timeout_ms: u64,
    /// Trusted issuers and their key material
    #[serde(default)]
    pub issuers: Vec<IssuerConfig>,
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            expected_audience: None,
            enforce_audience: true,
            allowed_algorithms: default_algorithms(),
            key_timeout_ms: default_timeout_ms(),
            issuers: Vec::new(),
        }
    }
}

/// Key material for one trusted issuer
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IssuerConfig {
    /// A fixed PEM public key
    Pem {
        /// `iss` value
        issuer: String,
        /// Algorithm the key signs with
        algorithm: Algorithm,
        /// Key id the key is published under
        #[serde(default)]
        kid: Option<String>,
        /// Inline PEM
        #[serde(default)]
        public_key_pem: Option<String>,
        /// PEM file, used when no inline PEM is given
        #[serde(default)]
        public_key_path: Option<PathBuf>,
    },
    /// Keys published as a JWKS
    Jwks {
        /// `iss` value
        issuer: String,
        /// JWKS endpoint
        jwks_uri: String,
        /// How long a fetched key set is reused
        #[serde(default = "default_cache_ttl_secs")]
        cache_ttl_secs: u64,
    },
}

impl IssuerConfig {
    /// `iss` value this entry trusts
    pub fn issuer(&self) -> &str {
        match self {
            Self::Pem { issuer, .. } | Self::Jwks { issuer, .. } => issuer,
        }
    }
}

impl AssertionConfig {
    /// Bound on each key lookup
    pub fn key_timeout(&self) -> Duration {
        Duration::from_millis(self.key_timeout_ms)
    }

    /// Audience to enforce for `identity`, if any
    pub fn audience_for(&self, identity: &ApplicationIdentity) -> Option<String> {
        if !self.enforce_audience {
            return None;
        }
        Some(
            self.expected_audience
                .clone()
                .unwrap_or_else(|| identity.as_str().to_string()),
        )
    }

    /// Reject settings under which no assertion could ever verify
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidAlgorithms`] as for [`Self::validate_algorithms`]
    /// - [`ConfigError::ZeroTimeout`] when `key_timeout_ms` is zero
    /// - [`ConfigError::NoTrustedIssuers`] when `issuers` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_algorithms()?;
        if self.key_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("assertion.key_timeout_ms"));
        }
        if self.issuers.is_empty() {
            return Err(ConfigError::NoTrustedIssuers);
        }
        Ok(())
    }

    /// Check the algorithm allowlist
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAlgorithms`] for an empty list or a symmetric
    /// algorithm.
    pub fn validate_algorithms(&self) -> Result<(), ConfigError> {
        if self.allowed_algorithms.is_empty() {
            return Err(ConfigError::InvalidAlgorithms("list is empty".to_string()));
        }
        if let Some(alg) = self
            .allowed_algorithms
            .iter()
            .find(|alg| matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
        {
            return Err(ConfigError::InvalidAlgorithms(format!(
                "{alg:?} is symmetric"
            )));
        }
        Ok(())
    }

    /// Load every issuer's key material
    ///
    /// # Errors
    ///
    /// Unreadable or unparsable PEM keys, PEM entries with no key, invalid
    /// JWKS URIs.
    pub fn build_key_ring(&self) -> Result<KeyRing, ConfigError> {
        let mut ring = KeyRing::new();

        for entry in &self.issuers {
            match entry {
                IssuerConfig::Pem {
                    issuer,
                    algorithm,
                    kid,
                    public_key_pem,
                    public_key_path,
                } => {
                    let pem = match (public_key_pem, public_key_path) {
                        (Some(pem), _) => pem.clone().into_bytes(),
                        (None, Some(path)) => {
                            std::fs::read(path).map_err(|source| ConfigError::Io {
                                path: path.clone(),
                                source,
                            })?
                        }
                        (None, None) => {
                            return Err(ConfigError::InvalidIssuer {
                                issuer: issuer.clone(),
                                message: "public_key_pem or public_key_path is required"
                                    .to_string(),
                            });
                        }
                    };

                    let mut key = VerificationKey::from_pem(*algorithm, &pem).map_err(|source| {
                        ConfigError::Key {
                            issuer: issuer.clone(),
                            source,
                        }
                    })?;
                    if let Some(kid) = kid {
                        key = key.with_kid(kid.clone());
                    }
                    ring.add_key(issuer.clone(), key);
                }
                IssuerConfig::Jwks {
                    issuer,
                    jwks_uri,
                    cache_ttl_secs,
                } => {
                    let uri = Url::parse(jwks_uri).map_err(|source| ConfigError::InvalidUrl {
                        url: jwks_uri.clone(),
                        source,
                    })?;
                    let client = JwksClient::new(uri, self.key_timeout())?
                        .with_ttl(Duration::from_secs(*cache_ttl_secs));
                    ring.add_jwks(issuer.clone(), client);
                }
            }
        }

        Ok(ring)
    }
}

impl HandshakeConfig {
    /// Minimal configuration: identity and platform base URL, defaults
    /// elsewhere
    pub fn new(application_id: impl Into<String>, platform_base_url: impl Into<String>) -> Self {
        Self {
            application: ApplicationConfig {
                id: Some(application_id.into()),
            },
            platform: PlatformConfig {
                base_url: platform_base_url.into(),
                authenticate_path: default_authenticate_path(),
                validate_path: default_validate_path(),
                timeout_ms: default_timeout_ms(),
                service_token: None,
            },
            assertion: AssertionConfig::default(),
        }
    }

    /// Add a trusted issuer
    pub fn with_issuer(mut self, issuer: IssuerConfig) -> Self {
        self.assertion.issuers.push(issuer);
        self
    }

    /// The configured identity
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingApplicationId`] when absent or blank.
    pub fn expected_identity(&self) -> Result<ApplicationIdentity, ConfigError> {
        match self.application.id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(ApplicationIdentity::new(id)),
            _ => Err(ConfigError::MissingApplicationId),
        }
    }
}

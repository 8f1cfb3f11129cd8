//! # extapp-auth - Extension Application Trust Handshake
//!
//! The verification core by which an extension application proves its
//! identity to a host platform:
//!
//! 1. **Authenticate** - the caller's `appId` must equal the one identity
//!    this deployment serves; only then is a handshake opened with the
//!    platform and a token pair returned.
//! 2. **Validate tokens** - the platform confirms both halves of the pair
//!    belong to the same active handshake.
//! 3. **Validate assertion** - a platform-signed JWT is verified (structure,
//!    algorithm, key, signature, expiry, issuer, audience) and its claims
//!    recovered.
//!
//! ## Architecture
//!
//! - [`identity`] - Identity Registry (`ApplicationIdentity`, constant-time match)
//! - [`token`] - Token Issuer/Verifier with bounded upstream calls
//! - [`platform`] - `PlatformAuthClient` seam and its reqwest implementation
//! - [`jwt`] - Assertion Verifier, key ring, JWKS client
//! - [`handshake`] - Orchestrator and the `HandshakeOutcome` boundary type
//! - [`config`] - Startup configuration
//!
//! The core is stateless: nothing about a handshake is stored between
//! steps, so any number of requests can run concurrently against one shared
//! [`HandshakeOrchestrator`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use extapp_auth::{
//!     HandshakeConfig, HandshakeOrchestrator, HandshakeOutcome, HandshakeRequest, IssuerConfig,
//! };
//!
//! # async fn run() -> Result<(), extapp_auth::ConfigError> {
//! let config = HandshakeConfig::new("acme-app", "https://platform.example.com").with_issuer(
//!     IssuerConfig::Jwks {
//!         issuer: "platform.example.com".to_string(),
//!         jwks_uri: "https://platform.example.com/.well-known/jwks.json".to_string(),
//!         cache_ttl_secs: 600,
//!     },
//! );
//! let orchestrator = HandshakeOrchestrator::from_config(&config)?;
//!
//! match orchestrator.authenticate(HandshakeRequest::new("acme-app")).await {
//!     HandshakeOutcome::Success(response) => println!("handshake opened: {response:?}"),
//!     other => println!("refused: {}", other.label()),
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod jwt;
pub mod platform;
pub mod token;
pub mod types;

pub use config::{AssertionConfig, ApplicationConfig, HandshakeConfig, IssuerConfig, PlatformConfig};
pub use error::{ConfigError, InitiateError, KeyError, UnavailableKind, UpstreamUnavailable};
pub use handshake::{
    HandshakeOrchestrator, HandshakeOutcome, HandshakeStage, HandshakeStep, Rejection,
};
pub use identity::{ApplicationIdentity, IdentityRegistry, StaticIdentityRegistry};
pub use jwt::{
    AssertionClaims, AssertionVerifier, Audience, JwksClient, KeyRing, KeySource,
    RejectionReason, VerificationKey, VerificationResult,
};
pub use platform::{HttpPlatformClient, PlatformAuthClient};
pub use token::TokenService;
pub use types::{AuthenticateResponse, HandshakeRequest, SignedAssertion, TokenPair};

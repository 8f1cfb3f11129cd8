//! Token Issuer/Verifier
//!
//! Initiates handshakes with the host platform and checks caller-submitted
//! token pairs against platform state. Every remote call is bounded by a
//! timeout; an elapsed timeout is reported as [`UpstreamUnavailable`] and the
//! in-flight request is dropped (which cancels it). Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{InitiateError, UpstreamUnavailable};
use crate::identity::ApplicationIdentity;
use crate::platform::PlatformAuthClient;
use crate::types::{AuthenticateResponse, TokenPair};

/// Default bound on a single platform call
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues and validates token pairs through a [`PlatformAuthClient`]
#[derive(Debug, Clone)]
pub struct TokenService {
    client: Arc<dyn PlatformAuthClient>,
    timeout: Duration,
}

impl TokenService {
    /// Wrap a platform client with the default timeout
    pub fn new(client: Arc<dyn PlatformAuthClient>) -> Self {
        Self {
            client,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Set the bound on each platform call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound on each platform call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Begin a handshake for `identity`
    ///
    /// # Errors
    ///
    /// [`InitiateError::AuthenticationDenied`] when the platform rejects the
    /// identity; [`InitiateError::Unavailable`] when it cannot be reached or
    /// does not answer within the timeout.
    pub async fn initiate(
        &self,
        identity: &ApplicationIdentity,
    ) -> Result<AuthenticateResponse, InitiateError> {
        tokio::time::timeout(self.timeout, self.client.initiate(identity))
            .await
            .map_err(|_| UpstreamUnavailable::timeout(self.timeout))?
    }

    /// Confirm both tokens belong to the same active handshake
    ///
    /// An incomplete pair is `false` without contacting the platform.
    ///
    /// # Errors
    ///
    /// Only on transport failure or timeout.
    pub async fn validate(&self, pair: &TokenPair) -> Result<bool, UpstreamUnavailable> {
        let Some((app_token, symphony_token)) = pair.complete() else {
            return Ok(false);
        };

        tokio::time::timeout(self.timeout, self.client.validate(app_token, symphony_token))
            .await
            .map_err(|_| UpstreamUnavailable::timeout(self.timeout))?
    }
}

//! Host platform authentication service client
//!
//! [`PlatformAuthClient`] is the seam between the handshake core and the
//! remote authority that issues and recognizes token pairs.
//! [`HttpPlatformClient`] is the production implementation over reqwest.
//!
//! # Wire contract
//!
//! | Operation | Request | 2xx | other 4xx | 5xx, 408, 429, transport |
//! |---|---|---|---|---|
//! | initiate | `POST {authenticate_path}` `{appId, appToken}` | `AuthenticateResponse` | denied | unavailable |
//! | validate | `POST {validate_path}` `{appToken, symphonyToken}` | `{"active": bool}` | `false` | unavailable |
//!
//! The client never follows redirects and never retries.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{InitiateError, UnavailableKind, UpstreamUnavailable};
use crate::identity::ApplicationIdentity;
use crate::types::AuthenticateResponse;

/// Remote operations the handshake delegates to the host platform
#[async_trait]
pub trait PlatformAuthClient: Send + Sync + fmt::Debug {
    /// Open a handshake for `identity` and obtain a token pair
    ///
    /// # Errors
    ///
    /// [`InitiateError::AuthenticationDenied`] when the platform refuses the
    /// identity, [`InitiateError::Unavailable`] on any infrastructure fault.
    async fn initiate(
        &self,
        identity: &ApplicationIdentity,
    ) -> Result<AuthenticateResponse, InitiateError>;

    /// Ask the platform whether the pair belongs to an active handshake
    ///
    /// # Errors
    ///
    /// Only when the platform cannot answer; an unknown, expired or
    /// mismatched pair is `Ok(false)`.
    async fn validate(
        &self,
        app_token: &str,
        symphony_token: &str,
    ) -> Result<bool, UpstreamUnavailable>;
}

/// Handshake initiation body
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateRequest<'a> {
    app_id: &'a str,
    app_token: &'a str,
}

/// Token-pair validation body
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    app_token: &'a str,
    symphony_token: &'a str,
}

/// Token-pair validation answer
#[derive(Debug, Clone, Deserialize)]
struct ValidateResponse {
    #[serde(alias = "valid")]
    active: bool,
}

/// reqwest-backed [`PlatformAuthClient`]
#[derive(Clone)]
pub struct HttpPlatformClient {
    authenticate_url: Url,
    validate_url: Url,
    service_token: Option<SecretString>,
    http_client: reqwest::Client,
}

// Manual Debug impl to prevent service_token exposure in logs
impl fmt::Debug for HttpPlatformClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPlatformClient")
            .field("authenticate_url", &self.authenticate_url.as_str())
            .field("validate_url", &self.validate_url.as_str())
            .field(
                "service_token",
                &self.service_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

impl HttpPlatformClient {
    /// Create a client for the given endpoints
    ///
    /// Redirects are disabled and every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        authenticate_url: Url,
        validate_url: Url,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self::from_client(authenticate_url, validate_url, http_client))
    }

    /// Create from an existing reqwest client
    ///
    /// Ensure the client is configured with `redirect::Policy::none()` and a
    /// request timeout.
    pub fn from_client(
        authenticate_url: Url,
        validate_url: Url,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            authenticate_url,
            validate_url,
            service_token: None,
            http_client,
        }
    }

    /// Authenticate this service to the platform with a bearer credential
    pub fn with_service_token(mut self, token: SecretString) -> Self {
        self.service_token = Some(token);
        self
    }

    /// Endpoint used for handshake initiation
    pub fn authenticate_url(&self) -> &Url {
        &self.authenticate_url
    }

    /// Endpoint used for token-pair validation
    pub fn validate_url(&self) -> &Url {
        &self.validate_url
    }

    fn post(&self, url: &Url) -> reqwest::RequestBuilder {
        let request = self.http_client.post(url.clone());
        match &self.service_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

/// Fresh application-side token for a new handshake
fn generate_app_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A 4xx that judges the request itself
///
/// 408 and 429 say the platform could not answer in time or at all, so they
/// are treated like server faults.
fn is_verdict(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
}

fn server_fault(status: StatusCode) -> UpstreamUnavailable {
    UpstreamUnavailable::new(
        UnavailableKind::Status(status.as_u16()),
        format!("platform answered {status}"),
    )
}

#[async_trait]
impl PlatformAuthClient for HttpPlatformClient {
    async fn initiate(
        &self,
        identity: &ApplicationIdentity,
    ) -> Result<AuthenticateResponse, InitiateError> {
        let app_token = generate_app_token();
        let body = InitiateRequest {
            app_id: identity.as_str(),
            app_token: &app_token,
        };

        let response = self
            .post(&self.authenticate_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamUnavailable::from_reqwest(&e))?;

        let status = response.status();
        if is_verdict(status) {
            return Err(InitiateError::AuthenticationDenied {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(server_fault(status).into());
        }

        let mut authenticated = response
            .json::<AuthenticateResponse>()
            .await
            .map_err(|e| {
                UpstreamUnavailable::new(
                    UnavailableKind::Decode,
                    format!("invalid authenticate response: {e}"),
                )
            })?;

        if authenticated.app_token.is_none() {
            authenticated.app_token = Some(app_token);
        }
        if authenticated.app_id.is_none() {
            authenticated.app_id = Some(identity.as_str().to_string());
        }

        Ok(authenticated)
    }

    async fn validate(
        &self,
        app_token: &str,
        symphony_token: &str,
    ) -> Result<bool, UpstreamUnavailable> {
        let body = ValidateRequest {
            app_token,
            symphony_token,
        };

        let response = self
            .post(&self.validate_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamUnavailable::from_reqwest(&e))?;

        let status = response.status();
        if is_verdict(status) {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(server_fault(status));
        }

        let answer = response.json::<ValidateResponse>().await.map_err(|e| {
            UpstreamUnavailable::new(
                UnavailableKind::Decode,
                format!("invalid validation response: {e}"),
            )
        })?;

        Ok(answer.active)
    }
}

//! Handshake Orchestrator
//!
//! Sequences the three handshake steps and maps every internal result onto a
//! [`HandshakeOutcome`]. The orchestrator holds no per-handshake state: each
//! step is an independent call, and the stages below describe sequencing only.
//!
//! ```text
//! AwaitingAppId ──authenticate──▶ AwaitingTokenValidation ──validate_tokens──▶
//! AwaitingAssertion ──validate_assertion──▶ Complete
//!
//! any step ──invalid input / upstream fault──▶ Rejected
//! ```
//!
//! This is the only component that logs handshake events. One event is
//! emitted per step with `step`, `stage`, `outcome` and, when rejected,
//! `reason` fields. Rejection reasons go to the log, never to the caller.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::HandshakeConfig;
use crate::error::{ConfigError, InitiateError, UpstreamUnavailable};
use crate::identity::{IdentityRegistry, StaticIdentityRegistry};
use crate::jwt::{AssertionClaims, AssertionVerifier, RejectionReason, VerificationResult};
use crate::token::TokenService;
use crate::types::{AuthenticateResponse, HandshakeRequest, SignedAssertion, TokenPair};

/// Conceptual position of a caller in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStage {
    /// Nothing presented yet
    AwaitingAppId,
    /// Identity accepted, token pair issued
    AwaitingTokenValidation,
    /// Token pair confirmed
    AwaitingAssertion,
    /// Assertion verified
    Complete,
    /// Terminal failure for this attempt
    Rejected,
}

impl HandshakeStage {
    /// Stable name for log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingAppId => "awaiting_app_id",
            Self::AwaitingTokenValidation => "awaiting_token_validation",
            Self::AwaitingAssertion => "awaiting_assertion",
            Self::Complete => "complete",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three independently invocable handshake steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStep {
    /// Step 1: identity confirmation and token-pair issuance
    Authenticate,
    /// Step 2: token-pair validation
    ValidateTokens,
    /// Step 3: signed-assertion verification
    ValidateAssertion,
}

impl HandshakeStep {
    /// Stage a caller must be in to take this step
    pub fn entry_stage(self) -> HandshakeStage {
        match self {
            Self::Authenticate => HandshakeStage::AwaitingAppId,
            Self::ValidateTokens => HandshakeStage::AwaitingTokenValidation,
            Self::ValidateAssertion => HandshakeStage::AwaitingAssertion,
        }
    }

    /// Stage reached when this step succeeds
    pub fn success_stage(self) -> HandshakeStage {
        match self {
            Self::Authenticate => HandshakeStage::AwaitingTokenValidation,
            Self::ValidateTokens => HandshakeStage::AwaitingAssertion,
            Self::ValidateAssertion => HandshakeStage::Complete,
        }
    }

    /// Stable name for log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::ValidateTokens => "validate_tokens",
            Self::ValidateAssertion => "validate_assertion",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// No `appId` in the request
    MissingApplicationId,
    /// `appId` differs from the expected identity
    IdentityMismatch,
    /// The platform refused to open a handshake
    HandshakeDenied,
    /// The token pair is incomplete or not active on the platform
    InvalidTokenPair,
    /// The signed assertion failed verification
    InvalidAssertion(RejectionReason),
}

impl Rejection {
    /// Stable name for log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingApplicationId => "missing_application_id",
            Self::IdentityMismatch => "identity_mismatch",
            Self::HandshakeDenied => "handshake_denied",
            Self::InvalidTokenPair => "invalid_token_pair",
            Self::InvalidAssertion(_) => "invalid_assertion",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAssertion(reason) => write!(f, "invalid_assertion({reason})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of one handshake step, as seen by the boundary
#[derive(Debug, Clone)]
pub enum HandshakeOutcome<T> {
    /// The step succeeded
    Success(T),
    /// The request itself was malformed (400)
    ClientInputError(Rejection),
    /// The caller is not trusted (401)
    Unauthorized(Rejection),
    /// An upstream dependency failed (500)
    InfrastructureError(UpstreamUnavailable),
}

impl<T> HandshakeOutcome<T> {
    /// Stage reached after taking `step` with this outcome
    pub fn stage(&self, step: HandshakeStep) -> HandshakeStage {
        match self {
            Self::Success(_) => step.success_stage(),
            _ => HandshakeStage::Rejected,
        }
    }

    /// Whether the step succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Rejection, when refused
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::ClientInputError(r) | Self::Unauthorized(r) => Some(*r),
            _ => None,
        }
    }

    /// Stable outcome category for log fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ClientInputError(_) => "client_input_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::InfrastructureError(_) => "infrastructure_error",
        }
    }

    /// Transform the success payload
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> HandshakeOutcome<U> {
        match self {
            Self::Success(value) => HandshakeOutcome::Success(f(value)),
            Self::ClientInputError(r) => HandshakeOutcome::ClientInputError(r),
            Self::Unauthorized(r) => HandshakeOutcome::Unauthorized(r),
            Self::InfrastructureError(e) => HandshakeOutcome::InfrastructureError(e),
        }
    }
}

/// Boundary-facing sequencer of the three handshake steps
///
/// Cheap to clone and safe to share: every collaborator is read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct HandshakeOrchestrator {
    registry: Arc<dyn IdentityRegistry>,
    tokens: TokenService,
    assertions: AssertionVerifier,
}

impl HandshakeOrchestrator {
    /// Assemble from already-built collaborators
    pub fn new(
        registry: Arc<dyn IdentityRegistry>,
        tokens: TokenService,
        assertions: AssertionVerifier,
    ) -> Self {
        Self {
            registry,
            tokens,
            assertions,
        }
    }

    /// Build every collaborator from configuration
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; all of them are fatal at startup.
    pub fn from_config(config: &HandshakeConfig) -> Result<Self, ConfigError> {
        let identity = config.expected_identity()?;
        config.platform.validate()?;
        config.assertion.validate()?;

        let client = config.platform.build_client()?;
        let tokens = TokenService::new(Arc::new(client)).with_timeout(config.platform.timeout());

        let key_ring = config.assertion.build_key_ring()?;
        let mut assertions = AssertionVerifier::new(Arc::new(key_ring))
            .with_algorithms(config.assertion.allowed_algorithms.iter().copied())
            .with_key_timeout(config.assertion.key_timeout());
        if let Some(audience) = config.assertion.audience_for(&identity) {
            assertions = assertions.with_audience(audience);
        }

        info!(
            application_id = %identity,
            issuers = config.assertion.issuers.len(),
            "Handshake orchestrator configured"
        );

        Ok(Self::new(
            Arc::new(StaticIdentityRegistry::new(identity)),
            tokens,
            assertions,
        ))
    }

    /// Step 1: confirm the caller's identity and open a handshake
    ///
    /// The identity check happens before any upstream call; a mismatch never
    /// reaches the platform.
    pub async fn authenticate(
        &self,
        request: HandshakeRequest,
    ) -> HandshakeOutcome<AuthenticateResponse> {
        let outcome = self.run_authenticate(request).await;
        record(HandshakeStep::Authenticate, &outcome);
        outcome
    }

    async fn run_authenticate(
        &self,
        request: HandshakeRequest,
    ) -> HandshakeOutcome<AuthenticateResponse> {
        let Some(app_id) = request.app_id else {
            return HandshakeOutcome::ClientInputError(Rejection::MissingApplicationId);
        };

        let expected = self.registry.expected_identity();
        if !expected.matches(&app_id) {
            return HandshakeOutcome::Unauthorized(Rejection::IdentityMismatch);
        }

        match self.tokens.initiate(expected).await {
            Ok(response) => HandshakeOutcome::Success(response),
            Err(InitiateError::AuthenticationDenied { .. }) => {
                HandshakeOutcome::Unauthorized(Rejection::HandshakeDenied)
            }
            Err(InitiateError::Unavailable(err)) => HandshakeOutcome::InfrastructureError(err),
        }
    }

    /// Step 2: confirm a token pair with the platform
    pub async fn validate_tokens(&self, pair: TokenPair) -> HandshakeOutcome<()> {
        let outcome = match self.tokens.validate(&pair).await {
            Ok(true) => HandshakeOutcome::Success(()),
            Ok(false) => HandshakeOutcome::Unauthorized(Rejection::InvalidTokenPair),
            Err(err) => HandshakeOutcome::InfrastructureError(err),
        };
        record(HandshakeStep::ValidateTokens, &outcome);
        outcome
    }

    /// Step 3: verify a signed assertion and recover its claims
    pub async fn validate_assertion(
        &self,
        assertion: SignedAssertion,
    ) -> HandshakeOutcome<AssertionClaims> {
        let outcome = match self.assertions.verify(&assertion).await {
            Ok(VerificationResult::Verified(claims)) => HandshakeOutcome::Success(claims),
            Ok(VerificationResult::Rejected(reason)) => {
                HandshakeOutcome::Unauthorized(Rejection::InvalidAssertion(reason))
            }
            Err(err) => HandshakeOutcome::InfrastructureError(err),
        };
        record(HandshakeStep::ValidateAssertion, &outcome);
        outcome
    }
}

fn record<T>(step: HandshakeStep, outcome: &HandshakeOutcome<T>) {
    let stage = outcome.stage(step);
    match outcome {
        HandshakeOutcome::Success(_) => {
            debug!(
                step = %step,
                stage = %stage,
                outcome = outcome.label(),
                "Handshake step succeeded"
            );
        }
        HandshakeOutcome::ClientInputError(rejection) | HandshakeOutcome::Unauthorized(rejection) => {
            info!(
                step = %step,
                stage = %stage,
                outcome = outcome.label(),
                reason = %rejection,
                "Handshake step rejected"
            );
        }
        HandshakeOutcome::InfrastructureError(err) => {
            error!(
                step = %step,
                stage = %stage,
                outcome = outcome.label(),
                upstream = %err.kind,
                error = %err,
                "Handshake step failed upstream"
            );
        }
    }
}

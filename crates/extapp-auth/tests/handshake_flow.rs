//! End-to-end handshake tests against a mock platform
//!
//! Covers the boundary categories for each step:
//! - missing input is a client-input error
//! - untrusted callers are unauthorized and never reach the platform
//! - upstream faults are infrastructure errors, never retried

mod common;

use std::time::Duration;

use common::{APP_ID, MockPlatform, SIGNING_KEY_PEM, mint_assertion, standard_claims};
use extapp_auth::{
    HandshakeOrchestrator, HandshakeOutcome, HandshakeRequest, HandshakeStage, HandshakeStep,
    Rejection, RejectionReason, SignedAssertion, TokenPair, UnavailableKind,
};
use serde_json::json;

fn orchestrator(platform: &MockPlatform) -> HandshakeOrchestrator {
    HandshakeOrchestrator::from_config(&platform.config()).unwrap()
}

#[tokio::test]
async fn test_expected_identity_opens_handshake() {
    // GIVEN: a healthy platform
    let platform = MockPlatform::start().await;
    platform.mock_authenticate_success(1).await;

    // WHEN: the expected application authenticates
    let outcome = orchestrator(&platform)
        .authenticate(HandshakeRequest::new(APP_ID))
        .await;

    // THEN: the platform's response is forwarded unchanged
    assert_eq!(
        outcome.stage(HandshakeStep::Authenticate),
        HandshakeStage::AwaitingTokenValidation
    );
    let HandshakeOutcome::Success(response) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(response.app_id.as_deref(), Some(APP_ID));
    assert_eq!(response.symphony_token.as_deref(), Some("platform-token-1"));
    assert_eq!(response.expire_at, Some(1_900_000_000_000));
}

#[tokio::test]
async fn test_mismatched_identity_makes_no_upstream_call() {
    let platform = MockPlatform::start().await;
    platform.expect_no_calls().await;
    let orchestrator = orchestrator(&platform);

    for candidate in ["other", "Acme-App", "ACME-APP", "acme-app\n", " acme-app", "acme", ""] {
        let outcome = orchestrator
            .authenticate(HandshakeRequest::new(candidate))
            .await;
        assert!(
            matches!(
                outcome,
                HandshakeOutcome::Unauthorized(Rejection::IdentityMismatch)
            ),
            "{candidate:?} should be unauthorized"
        );
    }
    // expect(0) is verified when the mock server drops
}

#[tokio::test]
async fn test_missing_app_id_is_bad_request() {
    let platform = MockPlatform::start().await;
    platform.expect_no_calls().await;

    let request: HandshakeRequest = serde_json::from_value(json!({"appToken": "x"})).unwrap();
    let outcome = orchestrator(&platform).authenticate(request).await;

    assert!(matches!(
        outcome,
        HandshakeOutcome::ClientInputError(Rejection::MissingApplicationId)
    ));
}

#[tokio::test]
async fn test_repeated_authenticate_is_independent() {
    let platform = MockPlatform::start().await;
    platform.mock_authenticate_success(2).await;
    let orchestrator = orchestrator(&platform);

    let first = orchestrator.authenticate(HandshakeRequest::new(APP_ID)).await;
    let second = orchestrator.authenticate(HandshakeRequest::new(APP_ID)).await;

    assert!(first.is_success());
    assert!(second.is_success());
}

#[tokio::test]
async fn test_platform_denial_is_unauthorized() {
    let platform = MockPlatform::start().await;
    platform.mock_authenticate_status(403).await;

    let outcome = orchestrator(&platform)
        .authenticate(HandshakeRequest::new(APP_ID))
        .await;
    assert_eq!(outcome.rejection(), Some(Rejection::HandshakeDenied));
}

#[tokio::test]
async fn test_platform_failure_is_infrastructure_error() {
    let platform = MockPlatform::start().await;
    platform.mock_authenticate_status(503).await;

    let outcome = orchestrator(&platform)
        .authenticate(HandshakeRequest::new(APP_ID))
        .await;
    match outcome {
        HandshakeOutcome::InfrastructureError(err) => {
            assert_eq!(err.kind, UnavailableKind::Status(503));
        }
        other => panic!("expected infrastructure error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_platform_times_out() {
    let platform = MockPlatform::start().await;
    platform
        .mock_authenticate_delayed(Duration::from_secs(3))
        .await;

    let outcome = orchestrator(&platform)
        .authenticate(HandshakeRequest::new(APP_ID))
        .await;
    match outcome {
        HandshakeOutcome::InfrastructureError(err) => assert!(err.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_platform_is_infrastructure_error() {
    let mut config = MockPlatform::start().await.config();
    config.platform.base_url = "http://127.0.0.1:1".to_string();
    let orchestrator = HandshakeOrchestrator::from_config(&config).unwrap();

    let outcome = orchestrator
        .validate_tokens(TokenPair::new("app-token-1", "platform-token-1"))
        .await;
    assert!(matches!(outcome, HandshakeOutcome::InfrastructureError(_)));
}

#[tokio::test]
async fn test_active_token_pair() {
    let platform = MockPlatform::start().await;
    platform.mock_validate(200, json!({"active": true})).await;

    let outcome = orchestrator(&platform)
        .validate_tokens(TokenPair::new("app-token-1", "platform-token-1"))
        .await;
    assert_eq!(
        outcome.stage(HandshakeStep::ValidateTokens),
        HandshakeStage::AwaitingAssertion
    );
}

#[tokio::test]
async fn test_inactive_token_pair_is_unauthorized() {
    for (status, body) in [(200, json!({"active": false})), (404, json!({}))] {
        let platform = MockPlatform::start().await;
        platform.mock_validate(status, body).await;

        let outcome = orchestrator(&platform)
            .validate_tokens(TokenPair::new("app-token-1", "stale"))
            .await;
        assert_eq!(outcome.rejection(), Some(Rejection::InvalidTokenPair));
    }
}

#[tokio::test]
async fn test_incomplete_token_pair_is_unauthorized_without_upstream_call() {
    let platform = MockPlatform::start().await;
    platform.expect_no_calls().await;

    let pair: TokenPair = serde_json::from_value(json!({"appToken": "app-token-1"})).unwrap();
    let outcome = orchestrator(&platform).validate_tokens(pair).await;
    assert!(matches!(
        outcome,
        HandshakeOutcome::Unauthorized(Rejection::InvalidTokenPair)
    ));
}

#[tokio::test]
async fn test_full_handshake() {
    let platform = MockPlatform::start().await;
    platform.mock_authenticate_success(1).await;
    platform.mock_validate(200, json!({"active": true})).await;
    let orchestrator = orchestrator(&platform);

    // Step 1
    let HandshakeOutcome::Success(response) =
        orchestrator.authenticate(HandshakeRequest::new(APP_ID)).await
    else {
        panic!("authenticate failed");
    };

    // Step 2
    let pair = TokenPair {
        app_token: response.app_token,
        symphony_token: response.symphony_token,
    };
    assert!(orchestrator.validate_tokens(pair).await.is_success());

    // Step 3
    let jwt = mint_assertion(&standard_claims(), SIGNING_KEY_PEM, None);
    let outcome = orchestrator
        .validate_assertion(SignedAssertion::new(jwt))
        .await;
    assert_eq!(
        outcome.stage(HandshakeStep::ValidateAssertion),
        HandshakeStage::Complete
    );
    let HandshakeOutcome::Success(claims) = outcome else {
        panic!("assertion rejected");
    };
    assert_eq!(claims.sub.as_deref(), Some("12345"));
    assert_eq!(claims.additional["user"]["displayName"], "Jane Doe");
}

#[tokio::test]
async fn test_expired_assertion_is_unauthorized() {
    let platform = MockPlatform::start().await;
    let mut claims = standard_claims();
    claims["exp"] = json!(common::current_timestamp() - 1);

    let outcome = orchestrator(&platform)
        .validate_assertion(SignedAssertion::new(mint_assertion(
            &claims,
            SIGNING_KEY_PEM,
            None,
        )))
        .await;
    assert_eq!(
        outcome.rejection(),
        Some(Rejection::InvalidAssertion(RejectionReason::Expired))
    );
}

#[tokio::test]
async fn test_unusable_configuration_is_fatal() {
    let platform = MockPlatform::start().await;

    let mut config = platform.config();
    config.assertion.issuers.clear();
    assert!(matches!(
        HandshakeOrchestrator::from_config(&config),
        Err(extapp_auth::ConfigError::NoTrustedIssuers)
    ));

    let mut config = platform.config();
    config.platform.timeout_ms = 0;
    assert!(matches!(
        HandshakeOrchestrator::from_config(&config),
        Err(extapp_auth::ConfigError::ZeroTimeout(_))
    ));

    let mut config = platform.config();
    config.assertion.key_timeout_ms = 0;
    assert!(matches!(
        HandshakeOrchestrator::from_config(&config),
        Err(extapp_auth::ConfigError::ZeroTimeout(_))
    ));
}

#[test]
fn test_missing_application_id_is_fatal() {
    let mut config = extapp_auth::HandshakeConfig::new(APP_ID, "https://platform.example.com");
    config.application.id = None;
    assert!(matches!(
        HandshakeOrchestrator::from_config(&config),
        Err(extapp_auth::ConfigError::MissingApplicationId)
    ));
}

//! HTTP surface of the handshake
//!
//! | Route | Body | 200 |
//! |---|---|---|
//! | `POST /application/authenticate` | `{appId}` | platform response |
//! | `POST /application/tokens/validate` | `{appToken, symphonyToken}` | empty |
//! | `POST /application/jwt/validate` | `{jwt}` | recovered claims |
//! | `GET /health` | | `{"status":"ok"}` |
//!
//! Failures carry only a category: `{"error": "bad_request" | "unauthorized"
//! | "upstream_unavailable"}`. Which check failed is logged by the
//! orchestrator and never returned.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use extapp_auth::{
    HandshakeOrchestrator, HandshakeOutcome, HandshakeRequest, SignedAssertion, TokenPair,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::debug;

type SharedOrchestrator = Arc<HandshakeOrchestrator>;

/// Build the router for all handshake routes
pub fn handshake_router(orchestrator: SharedOrchestrator) -> Router {
    Router::new()
        .route("/application/authenticate", post(authenticate))
        .route("/application/tokens/validate", post(validate_tokens))
        .route("/application/jwt/validate", post(validate_jwt))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

/// A handshake outcome whose success payload is already a response
pub struct HandshakeReply(pub HandshakeOutcome<Response>);

fn error_body(status: StatusCode, category: &'static str) -> Response {
    (status, Json(json!({ "error": category }))).into_response()
}

impl IntoResponse for HandshakeReply {
    fn into_response(self) -> Response {
        match self.0 {
            HandshakeOutcome::Success(response) => response,
            HandshakeOutcome::ClientInputError(_) => {
                error_body(StatusCode::BAD_REQUEST, "bad_request")
            }
            HandshakeOutcome::Unauthorized(_) => {
                error_body(StatusCode::UNAUTHORIZED, "unauthorized")
            }
            HandshakeOutcome::InfrastructureError(_) => {
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "upstream_unavailable")
            }
        }
    }
}

fn body_rejected(rejection: &JsonRejection) -> Response {
    debug!(error = %rejection, "Rejected request body");
    error_body(StatusCode::BAD_REQUEST, "bad_request")
}

async fn authenticate(
    State(orchestrator): State<SharedOrchestrator>,
    body: Result<Json<HandshakeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return body_rejected(&rejection),
    };
    let outcome = orchestrator.authenticate(request).await;
    HandshakeReply(outcome.map(|response| Json(response).into_response())).into_response()
}

async fn validate_tokens(
    State(orchestrator): State<SharedOrchestrator>,
    body: Result<Json<TokenPair>, JsonRejection>,
) -> Response {
    let Json(pair) = match body {
        Ok(body) => body,
        Err(rejection) => return body_rejected(&rejection),
    };
    let outcome = orchestrator.validate_tokens(pair).await;
    HandshakeReply(outcome.map(|()| StatusCode::OK.into_response())).into_response()
}

async fn validate_jwt(
    State(orchestrator): State<SharedOrchestrator>,
    body: Result<Json<SignedAssertion>, JsonRejection>,
) -> Response {
    let Json(assertion) = match body {
        Ok(body) => body,
        Err(rejection) => return body_rejected(&rejection),
    };
    let outcome = orchestrator.validate_assertion(assertion).await;
    HandshakeReply(outcome.map(|claims| Json(claims).into_response())).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

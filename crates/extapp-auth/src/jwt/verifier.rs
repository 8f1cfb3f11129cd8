//! Assertion Verifier
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. Compact structure: three segments, JSON header and claims
//! 2. Header algorithm against the allowlist (`none` and HS* never pass)
//! 3. Issuer peek and key resolution through the [`KeySource`]
//! 4. Signature, then `exp`/`nbf` with zero leeway, then issuer and audience
//!
//! An assertion is expired from the second named by `exp` onwards.
//!
//! Adversary-controlled input never produces an error: every failure is a
//! [`VerificationResult::Rejected`]. The only error is a key source that
//! cannot answer, which is an infrastructure fault.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header, get_current_timestamp};
use serde_json::Value;

use super::{AssertionClaims, KeySource, RejectionReason, VerificationResult};
use crate::error::UpstreamUnavailable;
use crate::types::SignedAssertion;

/// Asymmetric algorithms accepted unless configured otherwise
pub const DEFAULT_ALLOWED_ALGORITHMS: [Algorithm; 9] = [
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::EdDSA,
];

/// Default bound on a key lookup
pub const DEFAULT_KEY_TIMEOUT: Duration = Duration::from_secs(5);

fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Verifies platform-signed assertions
#[derive(Debug, Clone)]
pub struct AssertionVerifier {
    keys: Arc<dyn KeySource>,
    allowed_algorithms: Vec<Algorithm>,
    expected_audience: Option<String>,
    key_timeout: Duration,
}

impl AssertionVerifier {
    /// Verifier over `keys` with default algorithms and no audience check
    pub fn new(keys: Arc<dyn KeySource>) -> Self {
        Self {
            keys,
            allowed_algorithms: DEFAULT_ALLOWED_ALGORITHMS.to_vec(),
            expected_audience: None,
            key_timeout: DEFAULT_KEY_TIMEOUT,
        }
    }

    /// Require `aud` to contain `audience`
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audience = Some(audience.into());
        self
    }

    /// Restrict accepted algorithms
    ///
    /// Symmetric algorithms are dropped: assertions are verified with public
    /// keys only.
    pub fn with_algorithms(mut self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        self.allowed_algorithms = algorithms
            .into_iter()
            .filter(|alg| !is_symmetric(*alg))
            .collect();
        self
    }

    /// Bound on each key lookup
    pub fn with_key_timeout(mut self, timeout: Duration) -> Self {
        self.key_timeout = timeout;
        self
    }

    /// Accepted algorithms
    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed_algorithms
    }

    /// Audience the assertion must be minted for, if enforced
    pub fn expected_audience(&self) -> Option<&str> {
        self.expected_audience.as_deref()
    }

    /// Verify one assertion
    ///
    /// A missing `jwt` is rejected as malformed.
    ///
    /// # Errors
    ///
    /// Only when the key source is unreachable or exceeds the key timeout.
    pub async fn verify(
        &self,
        assertion: &SignedAssertion,
    ) -> Result<VerificationResult, UpstreamUnavailable> {
        let Some(token) = assertion.raw.as_deref() else {
            return Ok(VerificationResult::Rejected(RejectionReason::Malformed));
        };

        let Some(payload) = split_compact(token) else {
            return Ok(VerificationResult::Rejected(RejectionReason::Malformed));
        };

        // Unknown algorithm names (including "none") fail header decoding
        let header = match decode_header(token) {
            Ok(header) => header,
            Err(_) => return Ok(VerificationResult::Rejected(RejectionReason::BadSignature)),
        };
        if !self.allowed_algorithms.contains(&header.alg) {
            return Ok(VerificationResult::Rejected(RejectionReason::BadSignature));
        }

        let Some(issuer) = payload.get("iss").and_then(Value::as_str) else {
            return Ok(VerificationResult::Rejected(RejectionReason::InvalidClaims));
        };

        let resolved = tokio::time::timeout(self.key_timeout, self.keys.resolve(issuer, &header))
            .await
            .map_err(|_| UpstreamUnavailable::timeout(self.key_timeout))??;
        let Some(key) = resolved else {
            return Ok(VerificationResult::Rejected(RejectionReason::UnknownKey));
        };
        if key.algorithm.is_some_and(|pinned| pinned != header.alg) {
            return Ok(VerificationResult::Rejected(RejectionReason::BadSignature));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);
        validation.set_issuer(&[issuer]);
        match &self.expected_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = match decode::<AssertionClaims>(token, &key.key, &validation) {
            Ok(data) => data.claims,
            Err(err) => return Ok(VerificationResult::Rejected(rejection_for(err.kind()))),
        };

        // jsonwebtoken still accepts `exp == now`; an assertion is dead from `exp` on
        if claims.exp.is_none_or(|exp| exp <= get_current_timestamp()) {
            return Ok(VerificationResult::Rejected(RejectionReason::Expired));
        }

        Ok(VerificationResult::Verified(claims))
    }
}

/// Decoded claims segment of a structurally valid compact JWT
fn split_compact(token: &str) -> Option<serde_json::Map<String, Value>> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    json_object(header)?;
    json_object(payload)
}

fn json_object(segment: &str) -> Option<serde_json::Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn rejection_for(kind: &ErrorKind) -> RejectionReason {
    match kind {
        ErrorKind::ExpiredSignature => RejectionReason::Expired,
        ErrorKind::ImmatureSignature => RejectionReason::NotYetValid,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::MissingRequiredClaim(_) => RejectionReason::InvalidClaims,
        ErrorKind::InvalidToken | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            RejectionReason::Malformed
        }
        // Signature mismatch, key/algorithm family mismatch and any
        // low-level crypto failure
        _ => RejectionReason::BadSignature,
    }
}

//! Verification key material
//!
//! [`KeySource`] maps an issuer plus JWT header to the public key that must
//! have signed it. [`KeyRing`] is the configured implementation: per issuer,
//! either a fixed set of PEM keys or a [`JwksClient`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Header};

use super::JwksClient;
use crate::error::{KeyError, UnavailableKind, UpstreamUnavailable};

/// A public key able to verify assertion signatures
#[derive(Clone)]
pub struct VerificationKey {
    /// Key id (kid) this key is published under, if any
    pub kid: Option<String>,
    /// Algorithm the key is pinned to; `None` accepts any algorithm of the
    /// key's family
    pub algorithm: Option<Algorithm>,
    /// Decoding key
    pub key: DecodingKey,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Load a PEM public key for an asymmetric algorithm
    ///
    /// RSA and RSA-PSS algorithms expect an RSA key, ES* an EC key, EdDSA an
    /// Ed25519 key.
    ///
    /// # Errors
    ///
    /// [`KeyError::SymmetricAlgorithm`] for HS* algorithms,
    /// [`KeyError::InvalidPem`] when the PEM does not parse.
    pub fn from_pem(algorithm: Algorithm, pem: &[u8]) -> Result<Self, KeyError> {
        let key = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
            other => return Err(KeyError::SymmetricAlgorithm(other)),
        }
        .map_err(|source| KeyError::InvalidPem { algorithm, source })?;

        Ok(Self {
            kid: None,
            algorithm: Some(algorithm),
            key,
        })
    }

    /// Build from a published JWK
    ///
    /// A JWK `alg` pins the key to that algorithm.
    ///
    /// # Errors
    ///
    /// - [`KeyError::NotSigningKey`] for `use: "enc"` or an encryption `alg`
    /// - [`KeyError::SymmetricAlgorithm`] for an HS* `alg`
    /// - [`KeyError::InvalidJwk`] when the JWK cannot be converted
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        let kid = jwk.common.key_id.clone();
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return Err(KeyError::NotSigningKey(kid));
        }

        let algorithm = match jwk.common.key_algorithm {
            None => None,
            Some(alg) => match signing_algorithm(alg) {
                Some(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => {
                    return Err(KeyError::SymmetricAlgorithm(alg));
                }
                Some(alg) => Some(alg),
                None => return Err(KeyError::NotSigningKey(kid)),
            },
        };

        let key = DecodingKey::from_jwk(jwk).map_err(KeyError::InvalidJwk)?;
        Ok(Self {
            kid,
            algorithm,
            key,
        })
    }

    /// Publish the key under a key id
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

fn signing_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        // Key-encryption algorithms (RSA1_5, RSA-OAEP)
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Source of public verification keys, keyed by issuer
#[async_trait]
pub trait KeySource: Send + Sync + fmt::Debug {
    /// Key that must have signed a token from `issuer` with this header
    ///
    /// `Ok(None)` means no key is known.
    ///
    /// # Errors
    ///
    /// Only when remote key material cannot be fetched.
    async fn resolve(
        &self,
        issuer: &str,
        header: &Header,
    ) -> Result<Option<VerificationKey>, UpstreamUnavailable>;
}

#[derive(Debug, Clone)]
enum IssuerKeys {
    Static(Vec<VerificationKey>),
    Jwks(Arc<JwksClient>),
}

/// Configured key material for every trusted issuer
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    issuers: HashMap<String, IssuerKeys>,
}

impl KeyRing {
    /// Empty key ring (trusts nobody)
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `key` for tokens from `issuer`
    ///
    /// Replaces a JWKS source previously registered for the same issuer.
    pub fn add_key(&mut self, issuer: impl Into<String>, key: VerificationKey) {
        match self.issuers.entry(issuer.into()).or_insert_with(|| IssuerKeys::Static(Vec::new())) {
            IssuerKeys::Static(keys) => keys.push(key),
            slot @ IssuerKeys::Jwks(_) => *slot = IssuerKeys::Static(vec![key]),
        }
    }

    /// Fetch keys for `issuer` from a JWKS endpoint
    pub fn add_jwks(&mut self, issuer: impl Into<String>, client: JwksClient) {
        self.issuers
            .insert(issuer.into(), IssuerKeys::Jwks(Arc::new(client)));
    }

    /// Builder-style [`KeyRing::add_key`]
    pub fn with_key(mut self, issuer: impl Into<String>, key: VerificationKey) -> Self {
        self.add_key(issuer, key);
        self
    }

    /// Whether any key material is registered for `issuer`
    pub fn trusts(&self, issuer: &str) -> bool {
        self.issuers.contains_key(issuer)
    }

    /// Number of trusted issuers
    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    /// Whether no issuer is trusted
    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }
}

/// Keys published under the header kid win over kid-less keys; within each
/// group a key pinned to the header algorithm wins.
fn select_static(keys: &[VerificationKey], header: &Header) -> Option<VerificationKey> {
    let kid = header.kid.as_deref();
    let pick = |candidates: Vec<&VerificationKey>| {
        candidates
            .iter()
            .find(|k| k.algorithm == Some(header.alg))
            .or_else(|| candidates.first())
            .map(|k| (*k).clone())
    };

    let by_kid: Vec<_> = match kid {
        Some(kid) => keys.iter().filter(|k| k.kid.as_deref() == Some(kid)).collect(),
        None => Vec::new(),
    };
    if !by_kid.is_empty() {
        return pick(by_kid);
    }
    pick(keys.iter().filter(|k| k.kid.is_none()).collect())
}

#[async_trait]
impl KeySource for KeyRing {
    async fn resolve(
        &self,
        issuer: &str,
        header: &Header,
    ) -> Result<Option<VerificationKey>, UpstreamUnavailable> {
        match self.issuers.get(issuer) {
            None => Ok(None),
            Some(IssuerKeys::Static(keys)) => Ok(select_static(keys, header)),
            Some(IssuerKeys::Jwks(client)) => {
                let Some(kid) = header.kid.as_deref() else {
                    return Ok(None);
                };
                let Some(jwk) = client.find_key(kid).await? else {
                    return Ok(None);
                };
                match VerificationKey::from_jwk(&jwk) {
                    Ok(key) => Ok(Some(key)),
                    // Published, but not usable for verifying signatures
                    Err(KeyError::NotSigningKey(_) | KeyError::SymmetricAlgorithm(_)) => Ok(None),
                    Err(e) => Err(UpstreamUnavailable::new(UnavailableKind::Decode, e.to_string())),
                }
            }
        }
    }
}

use crate::domain_model::*;
use crate::domain_port::{JwksError, SecretError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Not three dot-separated segments.
    #[error("invalid token")]
    Malformed,
    /// Any signature or claim failure. Deliberately carries no detail.
    #[error("invalid token")]
    Unauthorized,
    #[error("signing key not found: {0}")]
    SigningKeyNotFound(String),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Jwks(#[from] JwksError),
    #[error("key material error: {0}")]
    KeyMaterial(String),
}

/// Token issuing parameters. The three secret names point into the
/// secret store; the values themselves are never held in configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub leeway_secs: u64,
    /// Minimum time between two JWKS fetches triggered by unknown `kid`s.
    pub jwks_refetch_interval: Duration,
    pub private_key_secret: String,
    pub public_key_secret: String,
    pub kid_secret: String,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    /// RS256-signs `claims` with the current private key and `kid`.
    async fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError>;

    /// Checks structure, issuer, signature (key resolved through JWKS by
    /// `kid`), audience, `exp` and `nbf`.
    async fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

#[async_trait::async_trait]
pub trait JwksPublisher: Send + Sync {
    async fn current_jwks(&self) -> Result<Jwks, TokenError>;
}

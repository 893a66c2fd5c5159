use crate::application_port::{JwksPublisher, SecretProvider, TokenConfig, TokenError};
use crate::domain_model::{Jwk, Jwks};
use crate::domain_port::{JwksError, JwksSource};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use std::sync::Arc;

/// Publishes the current public key, read from the secret store, as a
/// single-entry JWKS.
pub struct RsaJwksPublisher {
    secrets: Arc<dyn SecretProvider>,
    public_key_secret: String,
    kid_secret: String,
}

impl RsaJwksPublisher {
    pub fn new(secrets: Arc<dyn SecretProvider>, cfg: &TokenConfig) -> Self {
        RsaJwksPublisher {
            secrets,
            public_key_secret: cfg.public_key_secret.clone(),
            kid_secret: cfg.kid_secret.clone(),
        }
    }
}

/// Accepts both `RSA PUBLIC KEY` (PKCS#1) and `PUBLIC KEY` (SPKI) PEM.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, TokenError> {
    RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| TokenError::KeyMaterial(format!("public key pem: {e}")))
}

pub fn rsa_jwk(kid: &str, key: &RsaPublicKey) -> Jwk {
    Jwk {
        kty: "RSA".to_string(),
        kid: kid.to_string(),
        use_field: "sig".to_string(),
        alg: Some("RS256".to_string()),
        n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
    }
}

#[async_trait::async_trait]
impl JwksPublisher for RsaJwksPublisher {
    async fn current_jwks(&self) -> Result<Jwks, TokenError> {
        let pem = self.secrets.get_secret(&self.public_key_secret).await?;
        let kid = self.secrets.get_secret(&self.kid_secret).await?;
        let key = parse_public_key_pem(&pem)?;
        Ok(Jwks {
            keys: vec![rsa_jwk(kid.trim(), &key)],
        })
    }
}

/// Resolves the key set in-process instead of calling back into our own
/// `/auth/jwks` endpoint.
pub struct LocalJwksSource {
    publisher: Arc<dyn JwksPublisher>,
}

impl LocalJwksSource {
    pub fn new(publisher: Arc<dyn JwksPublisher>) -> Self {
        LocalJwksSource { publisher }
    }
}

#[async_trait::async_trait]
impl JwksSource for LocalJwksSource {
    async fn fetch_jwks(&self) -> Result<Jwks, JwksError> {
        self.publisher
            .current_jwks()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))
    }
}

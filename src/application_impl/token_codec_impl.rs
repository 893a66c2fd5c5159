use crate::application_port::{SecretProvider, TokenCodec, TokenConfig, TokenError};
use crate::domain_model::TokenClaims;
use crate::domain_port::JwksSource;
use crate::logger::*;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};

struct SigningMaterial {
    kid: String,
    key: EncodingKey,
}

/// RS256 codec. Signs with the private key from the secret store and
/// verifies against keys published through a [`JwksSource`].
pub struct JwtRs256Codec {
    cfg: TokenConfig,
    secrets: Arc<dyn SecretProvider>,
    jwks: Arc<dyn JwksSource>,
    signing: OnceCell<SigningMaterial>,
    decoding_keys: DashMap<String, DecodingKey>,
    last_jwks_fetch: Mutex<Option<Instant>>,
}

#[derive(Deserialize)]
struct UnverifiedIssuer {
    iss: Option<String>,
}

/// Reads `iss` from the payload segment without checking the signature.
fn peek_issuer(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice::<UnverifiedIssuer>(&bytes).ok()?.iss
}

impl JwtRs256Codec {
    pub fn new(
        cfg: TokenConfig,
        secrets: Arc<dyn SecretProvider>,
        jwks: Arc<dyn JwksSource>,
    ) -> Self {
        JwtRs256Codec {
            cfg,
            secrets,
            jwks,
            signing: OnceCell::new(),
            decoding_keys: DashMap::new(),
            last_jwks_fetch: Mutex::new(None),
        }
    }

    async fn load_signing_material(&self) -> Result<SigningMaterial, TokenError> {
        let pem = self.secrets.get_secret(&self.cfg.private_key_secret).await?;
        let kid = self.secrets.get_secret(&self.cfg.kid_secret).await?;
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| TokenError::KeyMaterial(format!("private key pem: {e}")))?;
        Ok(SigningMaterial {
            kid: kid.trim().to_string(),
            key,
        })
    }

    async fn resolve_key(&self, kid: &str) -> Result<DecodingKey, TokenError> {
        if let Some(key) = self.decoding_keys.get(kid) {
            return Ok(key.clone());
        }

        // Misses are serialized, and within the refetch interval an unknown
        // kid is answered from the last fetched set.
        let mut last_fetch = self.last_jwks_fetch.lock().await;
        if let Some(key) = self.decoding_keys.get(kid) {
            return Ok(key.clone());
        }
        if let Some(at) = *last_fetch {
            if at.elapsed() < self.cfg.jwks_refetch_interval {
                debug!(kid, "unknown kid, jwks fetched recently");
                return Err(TokenError::SigningKeyNotFound(kid.to_string()));
            }
        }

        debug!(kid, "resolving verification key through jwks");
        let jwks = self.jwks.fetch_jwks().await?;
        *last_fetch = Some(Instant::now());
        for jwk in &jwks.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    self.decoding_keys.insert(jwk.kid.clone(), key);
                }
                Err(e) => warn!(kid = %jwk.kid, error = %e, "skipping unusable jwk"),
            }
        }

        self.decoding_keys
            .get(kid)
            .map(|key| key.clone())
            .ok_or_else(|| TokenError::SigningKeyNotFound(kid.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::RS256);
        v.validate_exp = true;
        v.validate_nbf = true;
        v.leeway = self.cfg.leeway_secs;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);
        v
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtRs256Codec {
    async fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let material = self
            .signing
            .get_or_try_init(|| self.load_signing_material())
            .await?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(material.kid.clone());
        encode(&header, claims, &material.key).map_err(|e| TokenError::KeyMaterial(e.to_string()))
    }

    async fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }

        // Foreign issuers are rejected before any key lookup.
        match peek_issuer(token) {
            Some(iss) if iss == self.cfg.issuer => {}
            _ => return Err(TokenError::Unauthorized),
        }

        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenError::Unauthorized)?;
        if header.alg != Algorithm::RS256 {
            return Err(TokenError::Unauthorized);
        }
        let kid = header.kid.ok_or(TokenError::Unauthorized)?;
        let key = self.resolve_key(&kid).await?;

        let data = decode::<TokenClaims>(token, &key, &self.validation()).map_err(|e| {
            debug!(kind = ?e.kind(), "token rejected");
            TokenError::Unauthorized
        })?;
        Ok(data.claims)
    }
}

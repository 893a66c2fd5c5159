//! Fixtures shared by the unit tests of this module.

use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::retry::RetryPolicy;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub const TEST_ISSUER: &str = "https://auth.fintrack.test";
pub const TEST_AUDIENCE: &str = "fintrack-web";
pub const TEST_KID: &str = "test-key-1";
pub const TEST_USER: &str = "ana@example.com";
pub const TEST_PASSWORD: &str = "correct horse battery";

pub const PRIVATE_KEY_SECRET: &str = "fintrack/jwt-private-key";
pub const PUBLIC_KEY_SECRET: &str = "fintrack/jwt-public-key";
pub const KID_SECRET: &str = "fintrack/jwt-kid";

const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/rsa_private.pem");
const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/rsa_public.pem");
const ROGUE_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/rogue_private.pem");

pub fn token_config() -> TokenConfig {
    TokenConfig {
        issuer: TEST_ISSUER.to_string(),
        audience: TEST_AUDIENCE.to_string(),
        access_ttl: Duration::from_secs(900),
        refresh_ttl: Duration::from_secs(7 * 24 * 3600),
        leeway_secs: 0,
        jwks_refetch_interval: Duration::from_secs(30),
        private_key_secret: PRIVATE_KEY_SECRET.to_string(),
        public_key_secret: PUBLIC_KEY_SECRET.to_string(),
        kid_secret: KID_SECRET.to_string(),
    }
}

pub fn static_secrets_without(missing: &[&str]) -> Arc<dyn SecretProvider> {
    let mut store = InMemorySecretStore::new();
    for (name, value) in [
        (PRIVATE_KEY_SECRET, PRIVATE_PEM),
        (PUBLIC_KEY_SECRET, PUBLIC_PEM),
        (KID_SECRET, TEST_KID),
    ] {
        if !missing.contains(&name) {
            store = store.with_secret(name, value);
        }
    }
    Arc::new(CachingSecretProvider::new(Arc::new(store), RetryPolicy::default()))
}

pub fn static_secrets() -> Arc<dyn SecretProvider> {
    static_secrets_without(&[])
}

fn local_jwks(secrets: Arc<dyn SecretProvider>) -> Arc<dyn JwksSource> {
    let publisher = Arc::new(RsaJwksPublisher::new(secrets, &token_config()));
    Arc::new(LocalJwksSource::new(publisher))
}

pub fn test_codec() -> JwtRs256Codec {
    let secrets = static_secrets();
    JwtRs256Codec::new(token_config(), secrets.clone(), local_jwks(secrets))
}

struct CountingJwks {
    inner: Arc<dyn JwksSource>,
    calls: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl JwksSource for CountingJwks {
    async fn fetch_jwks(&self) -> Result<Jwks, JwksError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_jwks().await
    }
}

pub fn counting_codec(refetch_interval: Duration) -> (JwtRs256Codec, Arc<AtomicU32>) {
    let secrets = static_secrets();
    let cfg = TokenConfig {
        jwks_refetch_interval: refetch_interval,
        ..token_config()
    };
    let calls = Arc::new(AtomicU32::new(0));
    let jwks = Arc::new(CountingJwks {
        inner: local_jwks(secrets.clone()),
        calls: calls.clone(),
    });
    (JwtRs256Codec::new(cfg, secrets, jwks), calls)
}

/// A well-formed token signed by a key that is not published.
pub fn rogue_token(claims: &TokenClaims, kid: &str) -> String {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = jsonwebtoken::EncodingKey::from_rsa_pem(ROGUE_PRIVATE_PEM.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// Cheap argon2 parameters; verification reads them back from the PHC string.
fn fast_password_hash(password: &str) -> String {
    let params = Params::new(8, 1, 1, None).unwrap();
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

/// The whole service graph over in-memory backends, with [`TEST_USER`]
/// already registered.
pub struct Harness {
    pub user_repo: Arc<InMemoryUserRepo>,
    pub invalid_tokens: Arc<InMemoryInvalidTokenStore>,
    pub codec: Arc<JwtRs256Codec>,
    pub issuer: Arc<TokenIssuer>,
    pub rotator: Arc<TokenRotator>,
    pub auth: Arc<RealAuthService>,
    pub authorizer: Arc<TokenAuthorizer>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_secrets(static_secrets()).await
    }

    pub async fn with_secrets(secrets: Arc<dyn SecretProvider>) -> Self {
        let cfg = token_config();
        let user_repo = Arc::new(InMemoryUserRepo::new());
        let invalid_tokens = Arc::new(InMemoryInvalidTokenStore::new());
        let codec = Arc::new(JwtRs256Codec::new(
            cfg.clone(),
            secrets.clone(),
            local_jwks(secrets),
        ));
        let issuer = Arc::new(TokenIssuer::new(cfg, codec.clone(), user_repo.clone()));
        let rotator = Arc::new(TokenRotator::new(
            codec.clone(),
            user_repo.clone(),
            invalid_tokens.clone(),
            issuer.clone(),
        ));
        let auth = Arc::new(RealAuthService::new(
            user_repo.clone(),
            Arc::new(Argon2PasswordHasher),
            codec.clone(),
            invalid_tokens.clone(),
            issuer.clone(),
            rotator.clone(),
        ));
        let authorizer = Arc::new(TokenAuthorizer::new(codec.clone(), invalid_tokens.clone()));

        user_repo
            .create_user(&User::new(TEST_USER, fast_password_hash(TEST_PASSWORD)))
            .await
            .unwrap();

        Harness {
            user_repo,
            invalid_tokens,
            codec,
            issuer,
            rotator,
            auth,
            authorizer,
        }
    }

    pub async fn login(&self) -> AuthTokens {
        self.auth
            .login(LoginInput {
                username: TEST_USER.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .unwrap()
            .tokens
    }
}

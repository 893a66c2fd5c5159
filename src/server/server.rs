use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::infra_secrets::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::{Context, anyhow};
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

/// Composition root: every port is resolved to a concrete backend here and
/// handed to the HTTP layer.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub authorizer: Arc<dyn Authorizer>,
    pub jwks_publisher: Arc<dyn JwksPublisher>,
    pub secure_cookies: bool,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let retry = settings.retry.policy();
        let token_config = settings.auth.token_config();

        let secret_store: Arc<dyn SecretStore> = match settings.secrets.backend.as_str() {
            "file" => {
                let dir = settings
                    .secrets
                    .dir
                    .as_deref()
                    .ok_or_else(|| anyhow!("secrets.dir is required for the file backend"))?;
                Arc::new(FileSecretStore::new(dir))
            }
            "env" => Arc::new(EnvSecretStore::new(
                settings.secrets.prefix.clone().unwrap_or_default(),
            )),
            other => return Err(anyhow!("Unknown secrets backend: {}", other)),
        };
        let secrets: Arc<dyn SecretProvider> =
            Arc::new(CachingSecretProvider::new(secret_store, retry.clone()));

        let jwks_publisher: Arc<dyn JwksPublisher> =
            Arc::new(RsaJwksPublisher::new(secrets.clone(), &token_config));
        let jwks_source: Arc<dyn JwksSource> = match settings.auth.jwks_source.as_str() {
            "local" => Arc::new(LocalJwksSource::new(jwks_publisher.clone())),
            "http" => {
                let url = settings
                    .auth
                    .jwks_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("auth.jwks_url is required for the http jwks source"))?;
                Arc::new(HttpJwksSource::new(
                    url,
                    Duration::from_millis(settings.auth.jwks_timeout_ms),
                    retry.clone(),
                )?)
            }
            other => return Err(anyhow!("Unknown jwks source: {}", other)),
        };

        let mut pool = None;
        let user_repo: Arc<dyn UserRepo> = match settings.user.backend.as_str() {
            "memory" => Arc::new(InMemoryUserRepo::new()),
            "mysql" => {
                let dsn = settings
                    .user
                    .dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("user.dsn is required for the mysql backend"))?;
                let mysql = Pool::<MySql>::connect(dsn)
                    .await
                    .context("connect user store")?;
                pool = Some(mysql.clone());
                Arc::new(MySqlUserRepo::new(mysql))
            }
            other => return Err(anyhow!("Unknown user backend: {}", other)),
        };

        let invalid_tokens: Arc<dyn InvalidTokenStore> =
            match settings.invalid_tokens.backend.as_str() {
                "memory" => Arc::new(InMemoryInvalidTokenStore::new()),
                "redis" => {
                    let dsn = settings.invalid_tokens.dsn.as_deref().ok_or_else(|| {
                        anyhow!("invalid_tokens.dsn is required for the redis backend")
                    })?;
                    let redis_client = redis::Client::open(dsn)?;
                    let redis_manager = redis_client
                        .get_connection_manager()
                        .await
                        .context("connect invalid-token cache")?;
                    Arc::new(RedisInvalidTokenStore::new(
                        redis_manager,
                        settings.invalid_tokens.prefix.clone(),
                        retry.clone(),
                    ))
                }
                other => return Err(anyhow!("Unknown invalid-token backend: {}", other)),
            };

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtRs256Codec::new(
            token_config.clone(),
            secrets,
            jwks_source,
        ));
        let issuer = Arc::new(TokenIssuer::new(
            token_config,
            token_codec.clone(),
            user_repo.clone(),
        ));
        let rotator = Arc::new(TokenRotator::new(
            token_codec.clone(),
            user_repo.clone(),
            invalid_tokens.clone(),
            issuer.clone(),
        ));
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_codec.clone(),
            invalid_tokens.clone(),
            issuer,
            rotator,
        ));
        let authorizer: Arc<dyn Authorizer> =
            Arc::new(TokenAuthorizer::new(token_codec, invalid_tokens));

        info!(
            secrets = %settings.secrets.backend,
            users = %settings.user.backend,
            invalid_tokens = %settings.invalid_tokens.backend,
            jwks = %settings.auth.jwks_source,
            "server started"
        );

        Ok(Self {
            auth_service,
            authorizer,
            jwks_publisher,
            secure_cookies: settings.http.secure_cookies,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

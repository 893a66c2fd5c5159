use crate::application_port::{AuthError, TokenCodec, TokenConfig};
use crate::domain_model::*;
use crate::domain_port::UserRepo;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Mints access/refresh pairs and records their hashes on the user.
pub struct TokenIssuer {
    cfg: TokenConfig,
    codec: Arc<dyn TokenCodec>,
    user_repo: Arc<dyn UserRepo>,
}

impl TokenIssuer {
    pub fn new(cfg: TokenConfig, codec: Arc<dyn TokenCodec>, user_repo: Arc<dyn UserRepo>) -> Self {
        TokenIssuer {
            cfg,
            codec,
            user_repo,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.cfg
    }

    fn claims(&self, subject: &str, scope: TokenScope, ttl: Duration) -> TokenClaims {
        let now = Utc::now();
        let exp = now + ttl;
        TokenClaims {
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            sub: subject.to_string(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            scope,
        }
    }

    async fn mint(&self, claims: TokenClaims) -> Result<AuthToken, AuthError> {
        let value = self.codec.sign(&claims).await?;
        Ok(AuthToken {
            value,
            expires_at: claims.expires_at(),
        })
    }

    /// Issues a fresh pair for `user` and persists it with one conditional
    /// write. `user` must be the record as last read from the repository.
    pub async fn issue_tokens(&self, mut user: User) -> Result<AuthTokens, AuthError> {
        let access_token = self
            .mint(self.claims(&user.username, TokenScope::Access, self.cfg.access_ttl))
            .await?;
        let refresh_token = self
            .mint(self.claims(&user.username, TokenScope::Refresh, self.cfg.refresh_ttl))
            .await?;

        user.rotate_token_hashes(access_token.hash(), refresh_token.hash());
        self.user_repo.update_user(&user).await?;

        debug!(
            username = %user.username,
            refresh = refresh_token.hash().short(),
            "issued token pair"
        );
        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }

    /// Upper bound of how long a stored access token can still be live.
    pub fn access_horizon(&self) -> DateTime<Utc> {
        Utc::now() + self.cfg.access_ttl
    }

    /// Upper bound of how long a stored refresh token can still be live.
    pub fn refresh_horizon(&self) -> DateTime<Utc> {
        Utc::now() + self.cfg.refresh_ttl
    }
}

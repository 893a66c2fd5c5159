use crate::application_impl::{TokenIssuer, TokenRotator};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;

const CLEAR_HASHES_ATTEMPTS: usize = 3;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    invalid_tokens: Arc<dyn InvalidTokenStore>,
    issuer: Arc<TokenIssuer>,
    rotator: Arc<TokenRotator>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        invalid_tokens: Arc<dyn InvalidTokenStore>,
        issuer: Arc<TokenIssuer>,
        rotator: Arc<TokenRotator>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            invalid_tokens,
            issuer,
            rotator,
        }
    }

    fn validate_signup(username: &str, password: &str) -> Result<(), AuthError> {
        if !looks_like_email(username) {
            return Err(AuthError::Validation("invalid email".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }
        Ok(())
    }

    /// Adds `token` to the user's invalid list until its own expiry.
    async fn invalidate(&self, claims: &TokenClaims, token: &str) -> Result<(), AuthError> {
        let expire = claims.expires_at();
        if expire <= Utc::now() {
            // Expired already; verification rejects it on its own.
            return Ok(());
        }
        self.invalid_tokens
            .add_invalid_token(&claims.sub, &TokenHash::of(token), expire)
            .await?;
        Ok(())
    }

    async fn clear_token_hashes(&self, username: &str) -> Result<(), AuthError> {
        for _ in 0..CLEAR_HASHES_ATTEMPTS {
            let mut user = match self.user_repo.get_user_by_identifier(username).await {
                Ok(user) => user,
                Err(UserRepoError::NotFound) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            user.clear_token_hashes();
            match self.user_repo.update_user(&user).await {
                Ok(_) => return Ok(()),
                Err(UserRepoError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::Conflict)
    }
}

/// One `@`, a non-empty local part, a dotted domain, no whitespace.
pub fn looks_like_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn signup(&self, request: SignupInput) -> Result<UserId, AuthError> {
        let SignupInput { username, password } = request;
        Self::validate_signup(&username, &password)?;

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user = User::new(username, password_hash);
        self.user_repo.create_user(&user).await?;

        info!(username = %user.username, user_id = %user.user_id, "user signed up");
        Ok(user.user_id)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { username, password } = request;

        let user = match self.user_repo.get_user_by_identifier(&username).await {
            Ok(user) => user,
            Err(UserRepoError::NotFound) => return Err(AuthError::WrongCredentials),
            Err(e) => return Err(e.into()),
        };

        let ok = self
            .credential_hasher
            .verify_password(&password, &user.password_hash)
            .await?;
        if !ok {
            warn!(username = %username, "login with wrong password");
            return Err(AuthError::WrongCredentials);
        }

        let user_id = user.user_id;
        let tokens = self.issuer.issue_tokens(user).await?;
        info!(username = %username, "user logged in");
        Ok(LoginResult { user_id, tokens })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        self.rotator.rotate(refresh_token).await
    }

    async fn logout(&self, request: LogoutInput) -> Result<(), AuthError> {
        let refresh_token = request
            .refresh_token
            .ok_or_else(|| AuthError::Validation("refresh token is required".to_string()))?;

        // Only the current refresh token may end the session; a superseded one
        // goes down the reuse path instead.
        let (claims, _) = self.rotator.current_holder(&refresh_token).await?;
        self.invalidate(&claims, &refresh_token).await?;

        if let Some(access_token) = request.access_token {
            match self.token_codec.verify(&access_token).await {
                Ok(access) if access.scope == TokenScope::Access && access.sub == claims.sub => {
                    self.invalidate(&access, &access_token).await?;
                }
                Ok(_) => debug!(username = %claims.sub, "ignoring foreign access token on logout"),
                Err(e) => debug!(username = %claims.sub, error = %e, "access token not invalidated"),
            }
        }

        self.clear_token_hashes(&claims.sub).await?;
        info!(username = %claims.sub, "user logged out");
        Ok(())
    }
}

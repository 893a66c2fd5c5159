use crate::application_port::TokenError;
use crate::domain_model::*;
use crate::domain_port::{InvalidTokenError, SecretError, UserRepoError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("user already exists")]
    ExistingUser,
    #[error("wrong credentials")]
    WrongCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid token")]
    MalformedToken,
    #[error("invalid token")]
    Unauthorized,
    /// A token that was explicitly invalidated, or a replayed refresh token.
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid token")]
    RefreshTokenMismatch,
    #[error("concurrent update, retry the request")]
    Conflict,
    #[error("signing key not found: {0}")]
    SigningKeyNotFound(String),
    #[error("secret not found: {0}")]
    SecretNotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Malformed => AuthError::MalformedToken,
            TokenError::Unauthorized => AuthError::Unauthorized,
            TokenError::SigningKeyNotFound(kid) => AuthError::SigningKeyNotFound(kid),
            TokenError::Secret(SecretError::NotFound(name)) => AuthError::SecretNotFound(name),
            TokenError::Secret(e) => AuthError::Store(e.to_string()),
            TokenError::Jwks(e) => AuthError::Store(e.to_string()),
            TokenError::KeyMaterial(e) => AuthError::InternalError(e),
        }
    }
}

impl From<UserRepoError> for AuthError {
    fn from(error: UserRepoError) -> Self {
        match error {
            UserRepoError::NotFound => AuthError::UserNotFound,
            UserRepoError::AlreadyExists => AuthError::ExistingUser,
            UserRepoError::Conflict => AuthError::Conflict,
            UserRepoError::Store(e) => AuthError::Store(e),
        }
    }
}

impl From<InvalidTokenError> for AuthError {
    fn from(error: InvalidTokenError) -> Self {
        match error {
            InvalidTokenError::Store(e) => AuthError::Store(e),
            other => AuthError::InternalError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, Default)]
pub struct LogoutInput {
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn signup(&self, request: SignupInput) -> Result<UserId, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, request: LogoutInput) -> Result<(), AuthError>;
}

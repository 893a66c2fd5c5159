use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum InvalidTokenError {
    #[error("no invalid tokens recorded for user")]
    NotFound,
    #[error("expiry is in the past")]
    InvalidTtl,
    #[error("corrupt invalid-token list: {0}")]
    Corrupt(String),
    #[error("store error: {0}")]
    Store(String),
}

impl InvalidTokenError {
    pub fn is_transient(&self) -> bool {
        matches!(self, InvalidTokenError::Store(_))
    }
}

#[async_trait::async_trait]
pub trait InvalidTokenStore: Send + Sync {
    /// Live entries for `username`; `NotFound` when there are none.
    async fn get_invalid_tokens(&self, username: &str)
    -> Result<Vec<InvalidToken>, InvalidTokenError>;

    /// Appends `token_hash` to the user's list until `expire`. Adding a hash
    /// that is already listed is a no-op.
    async fn add_invalid_token(
        &self,
        username: &str,
        token_hash: &TokenHash,
        expire: DateTime<Utc>,
    ) -> Result<(), InvalidTokenError>;

    async fn is_invalidated(
        &self,
        username: &str,
        token_hash: &TokenHash,
    ) -> Result<bool, InvalidTokenError> {
        match self.get_invalid_tokens(username).await {
            Ok(list) => {
                let now = Utc::now();
                Ok(list
                    .iter()
                    .any(|t| &t.token_hash == token_hash && t.is_live(now)))
            }
            Err(InvalidTokenError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

use crate::domain_model::Jwks;

#[derive(Debug, Clone, thiserror::Error)]
pub enum JwksError {
    #[error("jwks fetch failed: {0}")]
    Fetch(String),
    #[error("jwks document invalid: {0}")]
    Decode(String),
}

impl JwksError {
    pub fn is_transient(&self) -> bool {
        matches!(self, JwksError::Fetch(_))
    }
}

/// Where verifiers obtain the published key set.
#[async_trait::async_trait]
pub trait JwksSource: Send + Sync {
    async fn fetch_jwks(&self) -> Result<Jwks, JwksError>;
}

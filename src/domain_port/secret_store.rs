#[derive(Debug, Clone, thiserror::Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secret store error: {0}")]
    Store(String),
}

impl SecretError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SecretError::Store(_))
    }
}

/// Backing store for named secret strings (key material, key ids).
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_secret(&self, name: &str) -> Result<String, SecretError>;
}

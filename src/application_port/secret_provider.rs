use crate::domain_port::SecretError;

/// Named secret lookup with process-lifetime caching.
#[async_trait::async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

use crate::application_port::SecretProvider;
use crate::domain_port::{SecretError, SecretStore};
use crate::logger::*;
use crate::retry::{RetryError, RetryPolicy};
use dashmap::DashMap;
use std::sync::Arc;

/// Caches every successfully fetched secret for the life of the process.
/// Concurrent first fetches of the same name may both reach the store; the
/// last writer wins with an identical value.
pub struct CachingSecretProvider {
    store: Arc<dyn SecretStore>,
    cache: DashMap<String, String>,
    retry: RetryPolicy,
}

impl CachingSecretProvider {
    pub fn new(store: Arc<dyn SecretStore>, retry: RetryPolicy) -> Self {
        CachingSecretProvider {
            store,
            cache: DashMap::new(),
            retry,
        }
    }
}

#[async_trait::async_trait]
impl SecretProvider for CachingSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        if let Some(value) = self.cache.get(name) {
            return Ok(value.clone());
        }

        debug!(secret = name, "secret cache miss");
        let value = self
            .retry
            .run("secret_fetch", SecretError::is_transient, || {
                self.store.fetch_secret(name)
            })
            .await
            .map_err(|e| match e {
                RetryError::Failed(e) => e,
                timeout @ RetryError::TimedOut { .. } => SecretError::Store(timeout.to_string()),
            })?;

        self.cache.insert(name.to_string(), value.clone());
        Ok(value)
    }
}

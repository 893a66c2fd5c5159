use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Process-local invalid-token lists; used by the `memory` backend and tests.
#[derive(Default)]
pub struct InMemoryInvalidTokenStore {
    lists: DashMap<String, Vec<InvalidToken>>,
}

impl InMemoryInvalidTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InvalidTokenStore for InMemoryInvalidTokenStore {
    async fn get_invalid_tokens(
        &self,
        username: &str,
    ) -> Result<Vec<InvalidToken>, InvalidTokenError> {
        let now = Utc::now();
        let mut entry = self
            .lists
            .get_mut(username)
            .ok_or(InvalidTokenError::NotFound)?;
        entry.retain(|t| t.is_live(now));
        if entry.is_empty() {
            return Err(InvalidTokenError::NotFound);
        }
        Ok(entry.clone())
    }

    async fn add_invalid_token(
        &self,
        username: &str,
        token_hash: &TokenHash,
        expire: DateTime<Utc>,
    ) -> Result<(), InvalidTokenError> {
        let now = Utc::now();
        if expire <= now {
            return Err(InvalidTokenError::InvalidTtl);
        }
        let mut entry = self.lists.entry(username.to_string()).or_default();
        let list = std::mem::take(&mut *entry);
        *entry = merge_invalid_token(list, InvalidToken::new(token_hash.clone(), expire), now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn unknown_user_has_no_invalid_tokens() {
        let store = InMemoryInvalidTokenStore::new();
        let err = store.get_invalid_tokens("ana").await.unwrap_err();
        assert!(matches!(err, InvalidTokenError::NotFound));
        assert!(!store.is_invalidated("ana", &TokenHash::of("t")).await.unwrap());
    }

    #[tokio::test]
    async fn past_expiry_is_rejected() {
        let store = InMemoryInvalidTokenStore::new();
        let err = store
            .add_invalid_token("ana", &TokenHash::of("t"), Utc::now() - Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, InvalidTokenError::InvalidTtl));
    }

    #[tokio::test]
    async fn adding_twice_keeps_one_entry_and_still_denies() {
        let store = InMemoryInvalidTokenStore::new();
        let hash = TokenHash::of("t");
        let expire = Utc::now() + Duration::minutes(5);
        store.add_invalid_token("ana", &hash, expire).await.unwrap();
        store.add_invalid_token("ana", &hash, expire).await.unwrap();

        assert_eq!(store.get_invalid_tokens("ana").await.unwrap().len(), 1);
        assert!(store.is_invalidated("ana", &hash).await.unwrap());
        assert!(!store.is_invalidated("bob", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_are_pruned_on_read() {
        let store = InMemoryInvalidTokenStore::new();
        store.lists.insert(
            "ana".to_string(),
            vec![InvalidToken::new(TokenHash::of("old"), Utc::now() - Duration::seconds(1))],
        );
        assert!(matches!(
            store.get_invalid_tokens("ana").await,
            Err(InvalidTokenError::NotFound)
        ));
    }
}

use crate::domain_model::TokenHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn new() -> Self {
        UserId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

/// A stored account. `username` is the unique login identifier (an email).
///
/// The hash fields track the token pair most recently issued to the user and
/// the pair the last rotation superseded. The superseded refresh hash lets a
/// replay be recognised; the superseded access hash is still live until its
/// own expiry and has to be revoked along with the rest on reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub access_token_hash: Option<TokenHash>,
    pub refresh_token_hash: Option<TokenHash>,
    pub previous_access_token_hash: Option<TokenHash>,
    pub previous_refresh_token_hash: Option<TokenHash>,
    /// Optimistic concurrency counter, bumped by every successful update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        User {
            user_id: UserId::new(),
            username: username.into(),
            password_hash: password_hash.into(),
            access_token_hash: None,
            refresh_token_hash: None,
            previous_access_token_hash: None,
            previous_refresh_token_hash: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a freshly issued pair. The pair being replaced moves into the
    /// `previous_*` slots.
    pub fn rotate_token_hashes(&mut self, access: TokenHash, refresh: TokenHash) {
        self.previous_access_token_hash = self.access_token_hash.take();
        self.previous_refresh_token_hash = self.refresh_token_hash.take();
        self.access_token_hash = Some(access);
        self.refresh_token_hash = Some(refresh);
        self.updated_at = Utc::now();
    }

    pub fn clear_token_hashes(&mut self) {
        self.access_token_hash = None;
        self.refresh_token_hash = None;
        self.previous_access_token_hash = None;
        self.previous_refresh_token_hash = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_shifts_refresh_hash_into_previous() {
        let mut user = User::new("ana@example.com", "phc");
        user.rotate_token_hashes(TokenHash::of("a0"), TokenHash::of("r0"));
        assert_eq!(user.previous_refresh_token_hash, None);

        user.rotate_token_hashes(TokenHash::of("a1"), TokenHash::of("r1"));
        assert_eq!(user.refresh_token_hash, Some(TokenHash::of("r1")));
        assert_eq!(user.previous_refresh_token_hash, Some(TokenHash::of("r0")));
        assert_eq!(user.access_token_hash, Some(TokenHash::of("a1")));
        assert_eq!(user.previous_access_token_hash, Some(TokenHash::of("a0")));
    }

    #[test]
    fn clearing_drops_every_hash() {
        let mut user = User::new("ana@example.com", "phc");
        user.rotate_token_hashes(TokenHash::of("a0"), TokenHash::of("r0"));
        user.rotate_token_hashes(TokenHash::of("a1"), TokenHash::of("r1"));
        user.clear_token_hashes();
        assert!(user.access_token_hash.is_none());
        assert!(user.refresh_token_hash.is_none());
        assert!(user.previous_access_token_hash.is_none());
        assert!(user.previous_refresh_token_hash.is_none());
    }
}

use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use crate::retry::{RetryError, RetryPolicy};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::sync::Arc;

const INVALID_TOKEN_CAS: &str = include_str!("invalid_token_cas.lua");
const MAX_CAS_ROUNDS: usize = 5;

/// The two round-trips the store needs from Redis.
#[async_trait::async_trait]
pub trait InvalidTokenConn: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, InvalidTokenError>;

    /// Writes `next` with an absolute expiry if the key still holds
    /// `expected` (an absent key matches `""`). Returns whether it swapped.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        next: &str,
        expire_at: i64,
    ) -> Result<bool, InvalidTokenError>;
}

pub struct RedisConn {
    conn: ConnectionManager,
    cas: Script,
}

impl RedisConn {
    pub fn new(conn: ConnectionManager) -> Self {
        RedisConn {
            conn,
            cas: Script::new(INVALID_TOKEN_CAS),
        }
    }
}

#[async_trait::async_trait]
impl InvalidTokenConn for RedisConn {
    async fn read(&self, key: &str) -> Result<Option<String>, InvalidTokenError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| InvalidTokenError::Store(e.to_string()))?;
        Ok(value)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        next: &str,
        expire_at: i64,
    ) -> Result<bool, InvalidTokenError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.cas.key(key);
        invocation.arg(expected).arg(next).arg(expire_at);
        let swapped: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| InvalidTokenError::Store(e.to_string()))?;
        Ok(swapped == 1)
    }
}

/// One JSON list per user under `{prefix}:{username}`. The key expires with
/// its latest entry. Appends are read-merge-write, committed by a
/// compare-and-set script so concurrent writers never drop each other's
/// entries.
pub struct RedisInvalidTokenStore {
    conn: Arc<dyn InvalidTokenConn>,
    prefix: String,
    retry: RetryPolicy,
}

impl RedisInvalidTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, retry: RetryPolicy) -> Self {
        Self::with_conn(Arc::new(RedisConn::new(conn)), prefix, retry)
    }

    pub fn with_conn(
        conn: Arc<dyn InvalidTokenConn>,
        prefix: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        RedisInvalidTokenStore {
            conn,
            prefix: prefix.into(),
            retry,
        }
    }

    fn key(&self, username: &str) -> String {
        format!("{}:{}", self.prefix, username)
    }

    async fn read_raw(&self, key: &str) -> Result<Option<String>, InvalidTokenError> {
        self.retry
            .run("invalid_tokens_get", InvalidTokenError::is_transient, || {
                self.conn.read(key)
            })
            .await
            .map_err(flatten)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        next: &str,
        expire_at: i64,
    ) -> Result<bool, InvalidTokenError> {
        self.retry
            .run("invalid_tokens_cas", InvalidTokenError::is_transient, || {
                self.conn.compare_and_set(key, expected, next, expire_at)
            })
            .await
            .map_err(flatten)
    }
}

fn flatten(error: RetryError<InvalidTokenError>) -> InvalidTokenError {
    match error {
        RetryError::Failed(e) => e,
        timeout @ RetryError::TimedOut { .. } => InvalidTokenError::Store(timeout.to_string()),
    }
}

fn decode_list(raw: Option<&str>) -> Result<Vec<InvalidToken>, InvalidTokenError> {
    match raw {
        None | Some("") => Ok(Vec::new()),
        Some(json) => {
            serde_json::from_str(json).map_err(|e| InvalidTokenError::Corrupt(e.to_string()))
        }
    }
}

/// The list can be dropped once its latest entry has expired.
fn list_expiry(list: &[InvalidToken]) -> Option<DateTime<Utc>> {
    list.iter().map(|t| t.expire).max()
}

#[async_trait::async_trait]
impl InvalidTokenStore for RedisInvalidTokenStore {
    async fn get_invalid_tokens(
        &self,
        username: &str,
    ) -> Result<Vec<InvalidToken>, InvalidTokenError> {
        let raw = self.read_raw(&self.key(username)).await?;
        let now = Utc::now();
        let live: Vec<InvalidToken> = decode_list(raw.as_deref())?
            .into_iter()
            .filter(|t| t.is_live(now))
            .collect();
        if live.is_empty() {
            return Err(InvalidTokenError::NotFound);
        }
        Ok(live)
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

        let key = self.key(username);
        for _ in 0..MAX_CAS_ROUNDS {
            let raw = self.read_raw(&key).await?;
            let current = decode_list(raw.as_deref())?;
            let merged =
                merge_invalid_token(current, InvalidToken::new(token_hash.clone(), expire), now);
            let expire_at = list_expiry(&merged).unwrap_or(expire).timestamp();
            let next = serde_json::to_string(&merged)
                .map_err(|e| InvalidTokenError::Corrupt(e.to_string()))?;

            let expected = raw.as_deref().unwrap_or("");
            if self.compare_and_set(&key, expected, &next, expire_at).await? {
                debug!(username, token = token_hash.short(), "token hash invalidated");
                return Ok(());
            }
            debug!(username, "invalid-token list changed concurrently, re-reading");
        }

        error!(username, "gave up appending to contended invalid-token list");
        Err(InvalidTokenError::Store("invalid-token list contention".to_string()))
    }
}

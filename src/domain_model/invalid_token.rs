use crate::domain_model::TokenHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One invalidated token in a user's list. Entries are meaningless once
/// `expire` has passed because the token itself is expired by then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidToken {
    pub token_hash: TokenHash,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expire: DateTime<Utc>,
    pub created_date: DateTime<Utc>,
}

impl InvalidToken {
    pub fn new(token_hash: TokenHash, expire: DateTime<Utc>) -> Self {
        InvalidToken {
            token_hash,
            expire,
            created_date: Utc::now(),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expire > now
    }
}

/// Drops expired entries and appends `entry` unless its hash is already
/// listed. The surviving duplicate keeps the later expiry.
pub fn merge_invalid_token(
    mut list: Vec<InvalidToken>,
    entry: InvalidToken,
    now: DateTime<Utc>,
) -> Vec<InvalidToken> {
    list.retain(|t| t.is_live(now));
    match list.iter_mut().find(|t| t.token_hash == entry.token_hash) {
        Some(existing) => {
            if entry.expire > existing.expire {
                existing.expire = entry.expire;
            }
        }
        None => list.push(entry),
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn merge_prunes_expired_and_deduplicates() {
        let now = Utc::now();
        let stale = InvalidToken::new(TokenHash::of("old"), now - Duration::seconds(5));
        let live = InvalidToken::new(TokenHash::of("live"), now + Duration::seconds(60));

        let list = merge_invalid_token(vec![stale, live.clone()], live.clone(), now);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].token_hash, TokenHash::of("live"));

        let later = InvalidToken::new(TokenHash::of("live"), now + Duration::seconds(600));
        let list = merge_invalid_token(list, later.clone(), now);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].expire, later.expire);
    }

    #[test]
    fn wire_format_uses_camel_case_and_unix_expiry() {
        let expire = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = InvalidToken::new(TokenHash("ab".into()), expire);
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["tokenHash"], "ab");
        assert_eq!(json["expire"], 1_700_000_000);
        assert!(json.get("createdDate").is_some());
    }
}

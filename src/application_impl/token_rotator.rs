use crate::application_impl::TokenIssuer;
use crate::application_port::{AuthError, TokenCodec};
use crate::domain_model::*;
use crate::domain_port::{InvalidTokenStore, UserRepo, UserRepoError};
use crate::logger::*;
use std::sync::Arc;

/// Redeems refresh tokens.
///
/// A presented token is compared with the user's stored refresh hash. A match
/// rotates to a new pair. A match against the previous (already rotated) hash
/// means the token was replayed: every live token of the user is invalidated
/// and the request is refused.
pub struct TokenRotator {
    codec: Arc<dyn TokenCodec>,
    user_repo: Arc<dyn UserRepo>,
    invalid_tokens: Arc<dyn InvalidTokenStore>,
    issuer: Arc<TokenIssuer>,
}

impl TokenRotator {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        user_repo: Arc<dyn UserRepo>,
        invalid_tokens: Arc<dyn InvalidTokenStore>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        TokenRotator {
            codec,
            user_repo,
            invalid_tokens,
            issuer,
        }
    }

    pub async fn rotate(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let (claims, user) = self.current_holder(refresh_token).await?;
        match self.issuer.issue_tokens(user).await {
            Ok(tokens) => {
                info!(username = %claims.sub, "refresh token rotated");
                Ok(tokens)
            }
            // Lost the race against a concurrent redemption of the same token.
            Err(AuthError::Conflict) => Err(AuthError::RefreshTokenMismatch),
            Err(e) => Err(e),
        }
    }

    /// Resolves `refresh_token` to its claims and owner, provided it is the
    /// user's current refresh token. A superseded token triggers revocation of
    /// the user's live tokens and yields `InvalidToken`; any other unknown
    /// token yields `RefreshTokenMismatch`.
    pub async fn current_holder(
        &self,
        refresh_token: &str,
    ) -> Result<(TokenClaims, User), AuthError> {
        let claims = self.codec.verify(refresh_token).await?;
        if claims.scope != TokenScope::Refresh {
            return Err(AuthError::Unauthorized);
        }

        let presented = TokenHash::of(refresh_token);
        if self
            .invalid_tokens
            .is_invalidated(&claims.sub, &presented)
            .await?
        {
            warn!(username = %claims.sub, "invalidated refresh token presented");
            return Err(AuthError::InvalidToken);
        }

        let user = match self.user_repo.get_user_by_identifier(&claims.sub).await {
            Ok(user) => user,
            Err(UserRepoError::NotFound) => return Err(AuthError::Unauthorized),
            Err(e) => return Err(e.into()),
        };

        if user.refresh_token_hash.as_ref() == Some(&presented) {
            return Ok((claims, user));
        }

        if user.previous_refresh_token_hash.as_ref() == Some(&presented) {
            warn!(
                username = %claims.sub,
                token = presented.short(),
                "refresh token reuse detected, revoking active tokens"
            );
            self.revoke_active_tokens(user).await?;
            return Err(AuthError::InvalidToken);
        }

        Err(AuthError::RefreshTokenMismatch)
    }

    /// Pushes every access hash that may still be live (current and
    /// superseded) and the current refresh hash into the invalid-token cache,
    /// then clears them on the record.
    async fn revoke_active_tokens(&self, mut user: User) -> Result<(), AuthError> {
        let access_horizon = self.issuer.access_horizon();
        let refresh_horizon = self.issuer.refresh_horizon();
        let live = [
            (&user.access_token_hash, access_horizon),
            (&user.previous_access_token_hash, access_horizon),
            (&user.refresh_token_hash, refresh_horizon),
        ];
        for (hash, horizon) in live {
            if let Some(hash) = hash {
                self.invalid_tokens
                    .add_invalid_token(&user.username, hash, horizon)
                    .await?;
            }
        }

        user.clear_token_hashes();
        match self.user_repo.update_user(&user).await {
            // Someone rotated meanwhile; the cache entries above still stand.
            Ok(_) | Err(UserRepoError::Conflict) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::test_support::*;
    use crate::application_port::Authorizer;

    #[tokio::test]
    async fn current_refresh_token_rotates_to_a_new_pair() {
        let h = Harness::new().await;
        let r0 = h.login().await;

        let r1 = h.rotator.rotate(&r0.refresh_token.value).await.unwrap();
        assert_ne!(r1.refresh_token.value, r0.refresh_token.value);

        let user = h.user_repo.get_user_by_identifier(TEST_USER).await.unwrap();
        assert_eq!(user.refresh_token_hash, Some(r1.refresh_token.hash()));
        assert_eq!(user.previous_refresh_token_hash, Some(r0.refresh_token.hash()));
    }

    #[tokio::test]
    async fn replayed_refresh_token_revokes_the_whole_set() {
        let h = Harness::new().await;
        let r0 = h.login().await;
        let r1 = h.rotator.rotate(&r0.refresh_token.value).await.unwrap();

        let err = h.rotator.rotate(&r0.refresh_token.value).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        assert!(h
            .invalid_tokens
            .is_invalidated(TEST_USER, &r1.refresh_token.hash())
            .await
            .unwrap());
        assert!(h
            .invalid_tokens
            .is_invalidated(TEST_USER, &r1.access_token.hash())
            .await
            .unwrap());

        let err = h.rotator.rotate(&r1.refresh_token.value).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let user = h.user_repo.get_user_by_identifier(TEST_USER).await.unwrap();
        assert!(user.refresh_token_hash.is_none());
        assert!(user.access_token_hash.is_none());
        assert!(user.previous_access_token_hash.is_none());
    }

    #[tokio::test]
    async fn replay_also_revokes_the_access_token_issued_with_it() {
        let h = Harness::new().await;
        let r0 = h.login().await;
        h.rotator.rotate(&r0.refresh_token.value).await.unwrap();

        // r0's access token is still within its lifetime before the replay.
        let arn = "arn:aws:execute-api:eu-west-1:123456789012:abc123/prod/GET/balance";
        let before = h
            .authorizer
            .authorize(AuthorizerRequest {
                authorization_header: format!("Bearer {}", r0.access_token.value),
                method_arn: arn.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(before.effect(), Some(Effect::Allow));

        let err = h.rotator.rotate(&r0.refresh_token.value).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let after = h
            .authorizer
            .authorize(AuthorizerRequest {
                authorization_header: format!("Bearer {}", r0.access_token.value),
                method_arn: arn.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(after.effect(), Some(Effect::Deny));
        assert_eq!(after.reason(), Some("invalid token use detected"));
    }

    #[tokio::test]
    async fn unknown_refresh_token_is_a_mismatch() {
        let h = Harness::new().await;
        let r0 = h.login().await;
        let r1 = h.rotator.rotate(&r0.refresh_token.value).await.unwrap();
        let r2 = h.rotator.rotate(&r1.refresh_token.value).await.unwrap();

        // r0 is two generations old now: neither current nor previous.
        let err = h.rotator.rotate(&r0.refresh_token.value).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenMismatch));
        assert!(!h
            .invalid_tokens
            .is_invalidated(TEST_USER, &r2.refresh_token.hash())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn access_token_cannot_be_redeemed() {
        let h = Harness::new().await;
        let tokens = h.login().await;
        let err = h.rotator.rotate(&tokens.access_token.value).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn malformed_refresh_token_is_reported_as_malformed() {
        let h = Harness::new().await;
        let err = h.rotator.rotate("garbage").await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken));
    }

    #[tokio::test]
    async fn concurrent_redemptions_let_exactly_one_win() {
        let h = Harness::new().await;
        let r0 = h.login().await;

        let (a, b) = tokio::join!(
            h.rotator.rotate(&r0.refresh_token.value),
            h.rotator.rotate(&r0.refresh_token.value)
        );
        let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
    }
}

use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::InvalidTokenStore;
use crate::logger::*;
use std::sync::Arc;

const ANONYMOUS: &str = "anonymous";
const USERS_SEGMENT: &str = "users";

pub struct TokenAuthorizer {
    codec: Arc<dyn TokenCodec>,
    invalid_tokens: Arc<dyn InvalidTokenStore>,
}

impl TokenAuthorizer {
    pub fn new(codec: Arc<dyn TokenCodec>, invalid_tokens: Arc<dyn InvalidTokenStore>) -> Self {
        TokenAuthorizer {
            codec,
            invalid_tokens,
        }
    }
}

fn bearer_value(header: &str) -> &str {
    let header = header.trim();
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
}

#[async_trait::async_trait]
impl Authorizer for TokenAuthorizer {
    async fn authorize(
        &self,
        request: AuthorizerRequest,
    ) -> Result<AuthorizerResponse, AuthorizerError> {
        let token = bearer_value(&request.authorization_header);
        if token.split('.').count() < 3 {
            return Err(AuthorizerError::Unauthorized);
        }

        let arn = MethodArn::parse(&request.method_arn);
        let resource = arn
            .as_ref()
            .map(MethodArn::stage_wildcard)
            .unwrap_or_else(|| "*".to_string());

        let claims = match self.codec.verify(token).await {
            Ok(claims) => claims,
            Err(e @ TokenError::SigningKeyNotFound(_)) => {
                warn!(error = %e, "denying token signed with unknown key");
                return Ok(AuthorizerResponse::deny(ANONYMOUS, resource, e.to_string()));
            }
            Err(e) => {
                debug!(error = %e, "denying unverifiable token");
                return Ok(AuthorizerResponse::deny(ANONYMOUS, resource, "invalid token"));
            }
        };
        let principal = claims.sub.as_str();

        if claims.scope != TokenScope::Access {
            warn!(username = principal, scope = %claims.scope, "denying non-access token");
            return Ok(AuthorizerResponse::deny(principal, resource, "invalid token"));
        }

        let hash = TokenHash::of(token);
        match self.invalid_tokens.is_invalidated(principal, &hash).await {
            Ok(false) => {}
            Ok(true) => {
                warn!(username = principal, token = hash.short(), "invalidated token presented");
                return Ok(AuthorizerResponse::deny(
                    principal,
                    resource,
                    "invalid token use detected",
                ));
            }
            Err(e) => {
                error!(username = principal, error = %e, "invalid-token lookup failed");
                return Ok(AuthorizerResponse::deny(principal, resource, "invalid token"));
            }
        }

        if let Some(path_user) = arn.as_ref().and_then(|a| a.path_user(USERS_SEGMENT)) {
            if path_user != principal {
                warn!(username = principal, path_user, "cross-user access denied");
                return Ok(AuthorizerResponse::deny(principal, resource, "forbidden"));
            }
        }

        Ok(AuthorizerResponse::allow(principal, resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::test_support::*;

    const ARN: &str = "arn:aws:execute-api:eu-west-1:123456789012:abc123/prod/GET/users/ana@example.com/incomes";
    const WILDCARD: &str = "arn:aws:execute-api:eu-west-1:123456789012:abc123/prod/*/*";

    fn request(header: String, arn: &str) -> AuthorizerRequest {
        AuthorizerRequest {
            authorization_header: header,
            method_arn: arn.to_string(),
        }
    }

    #[tokio::test]
    async fn valid_access_token_is_allowed_on_the_stage() {
        let h = Harness::new().await;
        let tokens = h.login().await;

        let response = h
            .authorizer
            .authorize(request(format!("Bearer {}", tokens.access_token.value), ARN))
            .await
            .unwrap();
        assert_eq!(response.effect(), Some(Effect::Allow));
        assert_eq!(response.principal_id, TEST_USER);
        assert_eq!(response.policy_document.statement[0].resource, vec![WILDCARD]);
    }

    #[tokio::test]
    async fn fewer_than_three_segments_produces_no_policy() {
        let h = Harness::new().await;
        let err = h
            .authorizer
            .authorize(request("Bearer abc.def".into(), ARN))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizerError::Unauthorized));
    }

    #[tokio::test]
    async fn non_jwt_content_is_denied_not_crashed() {
        let h = Harness::new().await;
        let response = h
            .authorizer
            .authorize(request("Bearer header.payload.signature".into(), ARN))
            .await
            .unwrap();
        assert_eq!(response.effect(), Some(Effect::Deny));
        assert_eq!(response.principal_id, "anonymous");
        assert_eq!(response.reason(), Some("invalid token"));
    }

    #[tokio::test]
    async fn cross_user_path_is_denied() {
        let h = Harness::new().await;
        let tokens = h.login().await;
        let other = "arn:aws:execute-api:eu-west-1:123456789012:abc123/prod/GET/users/bob@example.com/incomes";

        let response = h
            .authorizer
            .authorize(request(format!("Bearer {}", tokens.access_token.value), other))
            .await
            .unwrap();
        assert_eq!(response.effect(), Some(Effect::Deny));
        assert_eq!(response.principal_id, TEST_USER);
    }

    #[tokio::test]
    async fn invalidated_token_is_denied_with_reuse_reason() {
        let h = Harness::new().await;
        let tokens = h.login().await;
        h.invalid_tokens
            .add_invalid_token(
                TEST_USER,
                &tokens.access_token.hash(),
                tokens.access_token.expires_at,
            )
            .await
            .unwrap();

        let response = h
            .authorizer
            .authorize(request(format!("Bearer {}", tokens.access_token.value), ARN))
            .await
            .unwrap();
        assert_eq!(response.effect(), Some(Effect::Deny));
        assert_eq!(response.reason(), Some("invalid token use detected"));
    }

    #[tokio::test]
    async fn refresh_token_cannot_authorize_calls() {
        let h = Harness::new().await;
        let tokens = h.login().await;
        let response = h
            .authorizer
            .authorize(request(format!("Bearer {}", tokens.refresh_token.value), ARN))
            .await
            .unwrap();
        assert_eq!(response.effect(), Some(Effect::Deny));
    }

    #[tokio::test]
    async fn unknown_kid_is_denied_with_the_key_error() {
        let h = Harness::new().await;
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: TEST_ISSUER.into(),
            aud: TEST_AUDIENCE.into(),
            sub: TEST_USER.into(),
            exp: now + 300,
            nbf: now,
            iat: now,
            jti: "j".into(),
            scope: TokenScope::Access,
        };
        let token = rogue_token(&claims, "retired-key");

        let response = h
            .authorizer
            .authorize(request(format!("Bearer {token}"), ARN))
            .await
            .unwrap();
        assert_eq!(response.effect(), Some(Effect::Deny));
        assert!(response.reason().unwrap().contains("retired-key"));
    }

    #[tokio::test]
    async fn unparseable_arn_falls_back_to_wildcard_resource() {
        let h = Harness::new().await;
        let tokens = h.login().await;
        let response = h
            .authorizer
            .authorize(request(format!("Bearer {}", tokens.access_token.value), "whatever"))
            .await
            .unwrap();
        assert_eq!(response.effect(), Some(Effect::Allow));
        assert_eq!(response.policy_document.statement[0].resource, vec!["*"]);
    }
}

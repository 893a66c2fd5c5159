use crate::domain_model::{AuthorizerRequest, AuthorizerResponse};

#[derive(Debug, thiserror::Error)]
pub enum AuthorizerError {
    /// The bearer value is not even shaped like a JWT. No policy is produced.
    #[error("Unauthorized")]
    Unauthorized,
}

/// Gateway-side check run before every protected call. Every outcome past
/// the structural check is a policy document, never an error.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        request: AuthorizerRequest,
    ) -> Result<AuthorizerResponse, AuthorizerError>;
}

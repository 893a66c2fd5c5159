use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum UserRepoError {
    #[error("user not found")]
    NotFound,
    #[error("user already exists")]
    AlreadyExists,
    #[error("user record was modified concurrently")]
    Conflict,
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError>;

    /// Lookup by the login identifier.
    async fn get_user_by_identifier(&self, username: &str) -> Result<User, UserRepoError>;

    /// Fails with `AlreadyExists` when the identifier is taken.
    async fn create_user(&self, user: &User) -> Result<(), UserRepoError>;

    /// Conditional write: succeeds only while the stored version still equals
    /// `user.version`, and returns the new version.
    async fn update_user(&self, user: &User) -> Result<i64, UserRepoError>;
}

// store

mod invalid_token_store;
mod jwks_source;
mod secret_store;

pub use invalid_token_store::*;
pub use jwks_source::*;
pub use secret_store::*;

// repo

mod user_repo;

pub use user_repo::*;

mod invalid_token_store_memory;
mod secret_store_memory;
mod user_repo_memory;

pub use invalid_token_store_memory::*;
pub use secret_store_memory::*;
pub use user_repo_memory::*;

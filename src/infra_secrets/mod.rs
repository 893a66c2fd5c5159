mod env_secret_store;
mod file_secret_store;

pub use env_secret_store::*;
pub use file_secret_store::*;

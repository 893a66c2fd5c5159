mod auth_service;
mod authorizer;
mod secret_provider;
mod token_codec;

pub use auth_service::*;
pub use authorizer::*;
pub use secret_provider::*;
pub use token_codec::*;

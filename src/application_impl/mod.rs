mod auth_service_impl;
mod authorizer_impl;
mod credential_hasher_impl;
mod jwks_publisher_impl;
mod secret_provider_impl;
mod token_codec_impl;
mod token_issuer;
mod token_rotator;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_service_impl::*;
pub use authorizer_impl::*;
pub use credential_hasher_impl::*;
pub use jwks_publisher_impl::*;
pub use secret_provider_impl::*;
pub use token_codec_impl::*;
pub use token_issuer::*;
pub use token_rotator::*;

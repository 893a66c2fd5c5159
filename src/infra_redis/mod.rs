mod invalid_token_store_redis;

pub use invalid_token_store_redis::*;

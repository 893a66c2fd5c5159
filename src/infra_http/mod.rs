mod jwks_source_http;

pub use jwks_source_http::*;

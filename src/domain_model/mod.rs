mod invalid_token;
mod jwks;
mod policy;
mod token;
mod user;

pub use invalid_token::*;
pub use jwks::*;
pub use policy::*;
pub use token::*;
pub use user::*;

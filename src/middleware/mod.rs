pub mod auth;
pub mod guards;

pub use auth::{Claims, Identity, Role, TokenVerifier};
pub use guards::InternalCaller;

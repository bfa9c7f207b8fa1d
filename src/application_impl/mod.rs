mod deferred_deletion;
mod jwt_guard;
mod jwt_keyring_codec;
mod password_credentials;
mod refresh_coordinator;
mod token_issuer;
mod user_claims_mapper;

pub use deferred_deletion::*;
pub use jwt_guard::*;
pub use jwt_keyring_codec::*;
pub use password_credentials::*;
pub use refresh_coordinator::*;
pub use token_issuer::*;
pub use user_claims_mapper::*;

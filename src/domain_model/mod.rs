mod opaque_token;
mod subject;
mod token_set;
mod user;

pub use opaque_token::*;
pub use subject::*;
pub use token_set::*;
pub use user::*;

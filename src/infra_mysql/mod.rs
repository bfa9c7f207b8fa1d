mod credential_repo_mysql;
mod opaque_token_store_mysql;

pub use credential_repo_mysql::*;
pub use opaque_token_store_mysql::*;

mod util;

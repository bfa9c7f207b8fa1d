mod lock_service_redis;
mod opaque_token_store_redis;
mod result_cache_redis;

pub use lock_service_redis::*;
pub use opaque_token_store_redis::*;
pub use result_cache_redis::*;

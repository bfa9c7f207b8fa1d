mod credential_repo_memory;
mod lock_service_memory;
mod manual_clock;
mod opaque_token_store_memory;
mod result_cache_memory;
mod task_scheduler_tokio;

pub use credential_repo_memory::*;
pub use lock_service_memory::*;
pub use manual_clock::*;
pub use opaque_token_store_memory::*;
pub use result_cache_memory::*;
pub use task_scheduler_tokio::*;

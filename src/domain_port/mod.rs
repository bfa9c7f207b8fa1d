// store

mod opaque_token_store;
mod result_cache;

pub use opaque_token_store::*;
pub use result_cache::*;

// coordination

mod clock;
mod lock_service;
mod task_scheduler;

pub use clock::*;
pub use lock_service::*;
pub use task_scheduler::*;

// repo

mod credential_repo;
mod subject_repo;

pub use credential_repo::*;
pub use subject_repo::*;

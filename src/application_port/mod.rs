mod auth_error;
mod subject_mapping;
mod token_codec;
mod token_lifecycle;

pub use auth_error::*;
pub use subject_mapping::*;
pub use token_codec::*;
pub use token_lifecycle::*;

mod services;

pub use services::*;

//! Transport-facing presentation of token operations.

mod keys;
mod outcome;

pub use keys::*;
pub use outcome::*;

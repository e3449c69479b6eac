pub mod error;
pub mod reset;
pub mod token;

pub use error::{Error, Result};

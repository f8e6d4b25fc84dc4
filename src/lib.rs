pub mod binary;

pub use binary::error::Error;
pub use binary::module::{Decoder, Module};

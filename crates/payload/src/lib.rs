pub mod cayenne_lpp;
mod error;
mod registry;

pub use cayenne_lpp::CayenneLpp;
pub use error::{PayloadError, Result};
pub use registry::CodecRegistry;

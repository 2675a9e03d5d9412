mod event;
mod value;

pub use event::*;
pub use value::*;

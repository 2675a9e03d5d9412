mod broker;
mod domain;
mod event_hub;
mod memory;
mod streaming;

pub use broker::*;
pub use domain::*;
pub use event_hub::*;
pub use memory::*;
pub use streaming::*;

mod event_broker;
mod subscription;

pub use event_broker::*;
pub use subscription::*;

mod event_sink;
mod stream_state;
mod streaming_gateway;

pub use event_sink::*;
pub use stream_state::*;
pub use streaming_gateway::*;

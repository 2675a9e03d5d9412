mod in_memory_codec_binding_store;
mod in_memory_event_store;

pub use in_memory_codec_binding_store::*;
pub use in_memory_event_store::*;

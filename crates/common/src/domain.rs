mod codec;
mod device_id;
mod event;
mod readings;
mod result;

pub use codec::*;
pub use device_id::*;
pub use event::*;
pub use readings::*;
pub use result::*;

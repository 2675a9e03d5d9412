pub mod domain;
pub mod garde;
pub mod grpc;
pub mod proto;
pub mod telemetry;

pub use domain::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockCodec;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockCodecBindingStore;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEventStore;

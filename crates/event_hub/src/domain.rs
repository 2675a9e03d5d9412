mod event_publisher;
mod ingest_service;
mod query_service;

pub use event_publisher::*;
pub use ingest_service::*;
pub use query_service::*;

use async_trait::async_trait;
use common::proto::StreamDeviceEventsResponse;
use thiserror::Error;
use tokio::sync::mpsc;
use tonic::Status;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("client disconnected")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Client side of a streaming call
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Write one message, waiting for transport readiness
    async fn send(&self, message: StreamDeviceEventsResponse) -> Result<(), SinkError>;

    /// Resolves once the client has gone away
    async fn closed(&self) {
        futures::future::pending::<()>().await
    }

    /// Terminate the stream with an error status
    async fn abort(&self, _status: Status) {}
}

/// Sink feeding the response channel of a tonic server-streaming call
pub struct ChannelSink {
    sender: mpsc::Sender<Result<StreamDeviceEventsResponse, Status>>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<Result<StreamDeviceEventsResponse, Status>>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, message: StreamDeviceEventsResponse) -> Result<(), SinkError> {
        self.sender
            .send(Ok(message))
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    async fn closed(&self) {
        self.sender.closed().await
    }

    async fn abort(&self, status: Status) {
        let _ = self.sender.send(Err(status)).await;
    }
}

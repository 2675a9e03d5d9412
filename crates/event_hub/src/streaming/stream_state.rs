use std::fmt;

/// Lifecycle of one streaming call
///
/// `Pending → Active → {Completed, Cancelled, Faulted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Accepted, not yet subscribed
    Pending,
    /// Subscribed and forwarding events
    Active,
    /// The device topic was closed
    Completed,
    /// The client went away or the server is shutting down
    Cancelled,
    /// Writing to the client failed
    Faulted,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled | StreamState::Faulted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Pending => "pending",
            StreamState::Active => "active",
            StreamState::Completed => "completed",
            StreamState::Cancelled => "cancelled",
            StreamState::Faulted => "faulted",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use thiserror::Error;

/// Error taxonomy surfaced to a client in a request acknowledgment.
///
/// `Fatal` (worker death) deliberately has no variant here: it never reaches
/// a client, it terminates the process directly from [`crate::worker_pool::WorkerPool`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or malformed input from the client.
    #[error("{0}")]
    ArgumentInvalid(String),

    /// Referenced room/peer/transport/producer/consumer does not exist or is
    /// not owned by the requester.
    #[error("{0}")]
    NotFound(String),

    /// Peer id already in room, or resource already exists.
    #[error("{0}")]
    Conflict(String),

    /// The media engine refuses the operation (codec mismatch, cannot
    /// consume, transport already connected with different dtls, ...).
    #[error("{0}")]
    EngineRejected(String),

    /// The media engine call errored or timed out.
    #[error("{0}")]
    EngineFailed(String),
}

impl CoreError {
    /// The human-readable string sent back to the client as `{"error": ...}`.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

mod breaker;
mod bulkhead;
mod peer;
mod retry;

pub use breaker::{BreakerConfig, CircuitBreaker};
pub use bulkhead::Bulkhead;
pub use peer::{Peer, PeerConfig};
pub use retry::{retry, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid gRPC endpoint: '{0}'")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error(transparent)]
    Grpc(#[from] tonic::Status),
    #[error("circuit breaker for '{0}' is open")]
    CircuitOpen(String),
    #[error("bulkhead for '{0}' is full")]
    BulkheadFull(String),
    #[error("call to '{0}' exceeded its time limit")]
    TimeLimit(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the transport retry policy may re-attempt after this error.
    /// Only unavailability and deadline expiry qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Grpc(status) => matches!(
                status.code(),
                tonic::Code::Unavailable | tonic::Code::DeadlineExceeded
            ),
            Error::Transport(_) | Error::TimeLimit(_) => true,
            Error::InvalidEndpoint(_) | Error::CircuitOpen(_) | Error::BulkheadFull(_) => false,
        }
    }

    /// Map onto the wire status surfaced to callers.
    pub fn into_status(self) -> tonic::Status {
        match self {
            Error::Grpc(status) => status,
            Error::TimeLimit(_) => tonic::Status::deadline_exceeded(self.to_string()),
            Error::InvalidEndpoint(_)
            | Error::Transport(_)
            | Error::CircuitOpen(_)
            | Error::BulkheadFull(_) => tonic::Status::unavailable(self.to_string()),
        }
    }
}

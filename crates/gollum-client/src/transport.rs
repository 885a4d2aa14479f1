use std::pin::Pin;

use futures::Stream;

use crate::api::{ChatRequest, ChatResponse};
use crate::errors::ApiError;
use crate::run::RunOptions;
use crate::sse::WireEvent;

/// Decoded event sequence for one streaming run.
pub type WireEventStream =
    Pin<Box<dyn Stream<Item = Result<WireEvent, ApiError>> + Send + 'static>>;

/// Fully validated request handed to the transport.
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// Client-generated id used to correlate events and logs.
    pub run_id: uuid::Uuid,
    /// Serialized request body.
    pub body: ChatRequest,
    /// Run behavior options (timeout, buffering).
    pub options: RunOptions,
}

/// Seam between the consumer state machine and the HTTP layer.
///
/// The library ships one HTTP implementation; tests substitute fakes that
/// replay canned event sequences.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issues a buffered completion request and returns the parsed body.
    async fn complete(&self, request: &RunRequest) -> Result<ChatResponse, ApiError>;

    /// Opens a streaming completion and returns the decoded event sequence.
    ///
    /// Dropping the returned stream closes the underlying connection.
    async fn open_stream(&self, request: &RunRequest) -> Result<WireEventStream, ApiError>;
}

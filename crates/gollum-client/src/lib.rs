//! Async client for a GoLLuM (OpenAI-API-compatible) inference server.
//!
//! Supports a buffered request/response call and a streaming call that
//! consumes server-sent partial-completion events and reconstructs the
//! assistant output in order as it arrives.
//!
//! # Streaming usage
//!
//! ```no_run
//! use gollum_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = GollumClient::from_env()?;
//!
//! let mut stream = client
//!     .chat("toy-1")
//!     .user("Write a 7-word poem about llamas.")
//!     .max_tokens(50)
//!     .start_stream()
//!     .await?;
//!
//! while let Some(event) = stream.next_event().await {
//!     if let StreamEvent::Delta { text, .. } = event {
//!         print!("{text}");
//!     }
//! }
//!
//! let completion = stream.finish().await?;
//! println!("\nfinished: {:?}", completion.reason);
//! # Ok(())
//! # }
//! ```

/// Wire types for the OpenAI-compatible request/response surface.
pub mod api;
/// HTTP transport implementation and client entry point.
pub mod client;
/// Completion data model and delta accumulation.
pub mod completion;
/// Endpoint configuration.
pub mod config;
/// Public error types used by the client API.
pub mod errors;
/// Common imports for typical usage.
pub mod prelude;
/// Chat run builder, streaming handle, and cancellation handle.
pub mod run;
/// Server-sent event decoding.
pub mod sse;
/// Normalized public stream events.
pub mod stream;
/// Transport seam between the consumer and the HTTP layer.
pub mod transport;

pub use api::{ChatMessage, ChatRequest, ChatResponse, ModelInfo};
pub use client::GollumClient;
pub use completion::{Completion, TerminationReason};
pub use config::GollumConfig;
pub use errors::{ApiError, ClientError, StreamFailure};
pub use run::{AbortHandle, ChatBuilder, ChatStream, RunOptions};
pub use sse::WireEvent;
pub use stream::StreamEvent;
pub use transport::{ChatTransport, RunRequest, WireEventStream};

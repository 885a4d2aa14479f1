//! Common imports for typical client usage.
//!
//! This module intentionally exports the most frequently used builder/stream
//! types so examples and application code need fewer import lines.
pub use crate::{
    AbortHandle, ChatMessage, ChatStream, ClientError, Completion, GollumClient, GollumConfig,
    StreamEvent, TerminationReason,
};

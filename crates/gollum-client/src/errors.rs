/// Errors produced at the wire/transport layer before they are normalized
/// for the public stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server returned a well-formed error payload or a failure status.
    #[error("server error: {message}")]
    Server {
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Response shape or event sequencing was invalid.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ApiError {
    /// Creates a server-level error.
    pub fn server(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Server {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Server { message, .. }
            | Self::Transport { message }
            | Self::Protocol { message } => message,
        }
    }
}

/// Terminal stream failure carried inside `TerminationReason::Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamFailure {
    /// The server reported a failure mid-stream or rejected the request.
    #[error("server failure: {message}")]
    Server { message: String },
    /// Network/stream transport failed.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// The stream violated the expected wire protocol.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input to the builder API, reported before any I/O.
    #[error("validation error: {0}")]
    Validation(String),
    /// Request failed before or outside a run stream.
    #[error(transparent)]
    Api(ApiError),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ApiError> for ClientError {
    fn from(value: ApiError) -> Self {
        ClientError::Api(value)
    }
}

pub(crate) fn stream_failure_from_api_error(err: &ApiError) -> StreamFailure {
    match err {
        ApiError::Server { message, .. } => StreamFailure::Server {
            message: message.clone(),
        },
        ApiError::Transport { message } => StreamFailure::Transport {
            message: message.clone(),
        },
        ApiError::Protocol { message } => StreamFailure::Protocol {
            message: message.clone(),
        },
    }
}

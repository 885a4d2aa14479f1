//! HTTP transport and client entry point.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tracing::debug;

use crate::api::{ChatResponse, ModelInfo, ModelList};
use crate::config::GollumConfig;
use crate::errors::{ApiError, ClientError};
use crate::run::ChatBuilder;
use crate::sse;
use crate::transport::{ChatTransport, RunRequest, WireEventStream};

type ByteStream =
    Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Client for a GoLLuM (OpenAI-API-compatible) inference server.
#[derive(Clone)]
pub struct GollumClient {
    transport: Arc<HttpTransport>,
}

impl GollumClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: GollumConfig) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            transport: Arc::new(HttpTransport { client, config }),
        })
    }

    /// Creates a client from `GOLLUM_BASE_URL` / `GOLLUM_API_KEY`, falling
    /// back to the local defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(GollumConfig::from_env())
    }

    /// Starts building a chat completion for the given model.
    pub fn chat(&self, model: impl Into<String>) -> ChatBuilder {
        let transport: Arc<dyn ChatTransport> = self.transport.clone();
        ChatBuilder::new(transport, model.into())
    }

    /// Fetches the model descriptors the server advertises.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let transport = &self.transport;
        debug!(url = %transport.config.models_url(), "listing models");
        let response = transport
            .client
            .get(transport.config.models_url())
            .bearer_auth(&transport.config.api_key)
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("models request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::server(
                format!("models request failed with status {status}: {body}"),
                Some(status.as_u16()),
            )
            .into());
        }
        let list = response
            .json::<ModelList>()
            .await
            .map_err(|e| ApiError::protocol(format!("invalid model list body: {e}")))?;
        Ok(list.data)
    }
}

struct HttpTransport {
    client: reqwest::Client,
    config: GollumConfig,
}

impl HttpTransport {
    async fn post_chat(&self, request: &RunRequest) -> Result<reqwest::Response, ApiError> {
        let mut http_req = self
            .client
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request.body);
        if let Some(timeout) = request.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("chat request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::server(
                format!("chat request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn complete(&self, request: &RunRequest) -> Result<ChatResponse, ApiError> {
        let response = self.post_chat(request).await?;
        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ApiError::protocol(format!("invalid completion body: {e}")))
    }

    async fn open_stream(&self, request: &RunRequest) -> Result<WireEventStream, ApiError> {
        let response = self.post_chat(request).await?;
        let bytes: ByteStream = Box::pin(response.bytes_stream());
        Ok(Box::pin(sse::event_stream(bytes)))
    }
}

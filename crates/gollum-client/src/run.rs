//! Chat run builder, streaming handle, and the driving state machine.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest};
use crate::completion::{Applied, Completion, DeltaAccumulator, TerminationReason};
use crate::errors::{ClientError, StreamFailure, stream_failure_from_api_error};
use crate::sse::WireEvent;
use crate::stream::StreamEvent;
use crate::transport::{ChatTransport, RunRequest, WireEventStream};

/// Generic run behavior options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunOptions {
    /// Optional per-run timeout overriding the client default.
    pub timeout: Option<Duration>,
    /// Bounded event buffer size used by the streaming channel.
    pub stream_buffer_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stream_buffer_capacity: 128,
        }
    }
}

/// Handle used to request cancellation of a running stream.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is observed between events and becomes visible as a
    /// terminal `StreamEvent::Failed` with `TerminationReason::Cancelled`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Builder for configuring and running a single chat completion.
pub struct ChatBuilder {
    transport: Arc<dyn ChatTransport>,
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    options: RunOptions,
}

impl ChatBuilder {
    pub(crate) fn new(transport: Arc<dyn ChatTransport>, model: String) -> Self {
        Self {
            transport,
            model,
            messages: Vec::new(),
            max_tokens: None,
            temperature: None,
            options: RunOptions::default(),
        }
    }

    /// Appends a `system` role message.
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    /// Appends a `user` role message.
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    /// Appends an arbitrary message.
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Replaces all messages with the provided list.
    pub fn messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Caps the number of generated tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets an optional per-run timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the bounded stream buffer size used between the drive task and
    /// the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    /// Issues a buffered (non-streaming) request and returns the finished
    /// completion.
    pub async fn send(self) -> Result<Completion, ClientError> {
        let transport = self.transport.clone();
        let request = self.validate_and_build_request(false)?;
        debug!(run_id = %request.run_id, model = %request.body.model, "buffered chat completion");
        let response = transport.complete(&request).await.map_err(ClientError::Api)?;
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ClientError::Protocol("completion response carried no choices".into())
        })?;
        let reason = choice
            .finish_reason
            .as_deref()
            .map(TerminationReason::from_finish_reason)
            .unwrap_or(TerminationReason::Stop);
        Ok(Completion {
            text: choice.message.content,
            finished: true,
            reason: Some(reason),
            warnings: 0,
        })
    }

    /// Validates the builder state and starts a streaming run.
    ///
    /// The returned `ChatStream` yields a `Started` event, ordered `Delta`
    /// events, and exactly one terminal `Completed`/`Failed` event.
    pub async fn start_stream(self) -> Result<ChatStream, ClientError> {
        let transport = self.transport.clone();
        let request = self.validate_and_build_request(true)?;

        let (tx, rx) = mpsc::channel(request.options.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);

        let abort_handle = AbortHandle { tx: abort_tx };
        let run_id = request.run_id;
        let model = request.body.model.clone();
        tokio::spawn(run_task(transport, request, tx, final_tx, abort_rx));

        Ok(ChatStream {
            run_id,
            model,
            rx,
            final_rx,
            abort_handle,
            saw_terminal: false,
        })
    }

    /// Streams to completion and returns the final completion.
    pub async fn collect(self) -> Result<Completion, ClientError> {
        let stream = self.start_stream().await?;
        stream.finish().await
    }

    fn validate_and_build_request(self, stream: bool) -> Result<RunRequest, ClientError> {
        if self.model.trim().is_empty() {
            return Err(ClientError::Validation("model must not be empty".into()));
        }
        if self.messages.is_empty() {
            return Err(ClientError::Validation(
                "at least one message is required".into(),
            ));
        }
        for message in &self.messages {
            if message.content.trim().is_empty() {
                return Err(ClientError::Validation(
                    "message content must not be empty".into(),
                ));
            }
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(ClientError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }

        Ok(RunRequest {
            run_id: uuid::Uuid::new_v4(),
            body: ChatRequest {
                model: self.model,
                messages: self.messages,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                stream,
            },
            options: self.options,
        })
    }
}

/// Streaming handle returned by `ChatBuilder::start_stream`.
///
/// Use `next_event()` to consume events as they arrive and `finish()` to
/// obtain the final completion after the terminal event.
#[derive(Debug)]
pub struct ChatStream {
    run_id: uuid::Uuid,
    model: String,
    rx: mpsc::Receiver<StreamEvent>,
    final_rx: oneshot::Receiver<Completion>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl ChatStream {
    /// Returns the run id for this stream.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Returns a handle that can cancel the run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for and returns the next stream event.
    ///
    /// Returns `None` after the event channel is closed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        if let Some(StreamEvent::Completed { .. } | StreamEvent::Failed { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains the stream (if needed) and returns the final completion.
    ///
    /// Every terminal state resolves to `Ok`; inspect `Completion::reason`
    /// to distinguish normal completion from failure or cancellation, with
    /// any partial text retained. `Err` is reserved for a drive task that
    /// died without reporting a result.
    pub async fn finish(mut self) -> Result<Completion, ClientError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(StreamEvent::Completed { .. } | StreamEvent::Failed { .. }) => {
                    self.saw_terminal = true;
                }
                Some(_) => {}
                None => break,
            }
        }

        match self.final_rx.await {
            Ok(completion) => Ok(completion),
            Err(_) => Err(ClientError::Protocol(format!(
                "stream task ended without a final completion (model={})",
                self.model
            ))),
        }
    }
}

enum Exit {
    Terminal,
    ReceiverGone,
}

async fn run_task(
    transport: Arc<dyn ChatTransport>,
    request: RunRequest,
    tx: mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<Completion>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let run_id = request.run_id;
    let model = request.body.model.clone();
    let mut acc = DeltaAccumulator::default();

    if !send_event(
        &tx,
        StreamEvent::Started {
            run_id,
            model: model.clone(),
        },
    )
    .await
    {
        return;
    }

    let mut stream: WireEventStream = match transport.open_stream(&request).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(run_id = %run_id, model = %model, error = %err, "failed to open completion stream");
            acc.fail(stream_failure_from_api_error(&err));
            report_terminal(acc, run_id, &tx, final_tx).await;
            return;
        }
    };

    let mut seq = 0_u64;
    let mut abort_closed = false;
    let exit = loop {
        tokio::select! {
            changed = abort_rx.changed(), if !abort_closed => {
                match changed {
                    Ok(()) if *abort_rx.borrow() => {
                        acc.cancel();
                        break Exit::Terminal;
                    }
                    Ok(()) => {}
                    Err(_) => abort_closed = true,
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(event)) => {
                        if let WireEvent::Malformed { detail } = &event {
                            warn!(run_id = %run_id, detail = %detail, "skipping malformed stream frame");
                        }
                        match acc.apply(event) {
                            Applied::Delta(text) => {
                                debug!(run_id = %run_id, seq, "assistant delta");
                                let sent = send_event(&tx, StreamEvent::Delta { run_id, seq, text }).await;
                                seq = seq.saturating_add(1);
                                if !sent {
                                    break Exit::ReceiverGone;
                                }
                            }
                            Applied::Finished { trailing_delta } => {
                                if let Some(text) = trailing_delta {
                                    debug!(run_id = %run_id, seq, "assistant delta");
                                    if !send_event(&tx, StreamEvent::Delta { run_id, seq, text }).await {
                                        break Exit::ReceiverGone;
                                    }
                                }
                                break Exit::Terminal;
                            }
                            Applied::Nothing => {}
                        }
                    }
                    Some(Err(err)) => {
                        warn!(run_id = %run_id, model = %model, error = %err, "completion stream failed");
                        acc.fail(stream_failure_from_api_error(&err));
                        break Exit::Terminal;
                    }
                    None => {
                        acc.fail(StreamFailure::Protocol {
                            message: "stream ended without an end-of-stream marker".into(),
                        });
                        break Exit::Terminal;
                    }
                }
            }
        }
    };

    // The connection is released on every terminal path, including
    // cancellation, before the terminal event is reported.
    drop(stream);

    if let Exit::Terminal = exit {
        report_terminal(acc, run_id, &tx, final_tx).await;
    }
}

async fn report_terminal(
    acc: DeltaAccumulator,
    run_id: uuid::Uuid,
    tx: &mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<Completion>,
) {
    debug_assert!(acc.is_finished());
    let completion = acc.into_completion();
    let event = if completion.is_success() {
        StreamEvent::Completed {
            run_id,
            completion: completion.clone(),
        }
    } else {
        StreamEvent::Failed {
            run_id,
            completion: completion.clone(),
        }
    };
    let _ = send_event(tx, event).await;
    let _ = final_tx.send(completion);
}

async fn send_event(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}

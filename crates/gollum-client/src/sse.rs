//! Server-sent event decoding for the streaming completions endpoint.
//!
//! The decoder turns the raw response byte stream into a lazy, finite
//! sequence of [`WireEvent`]s. A malformed frame becomes a recoverable
//! `Malformed` event; a transport fault ends the sequence with a single
//! terminal error.

use std::collections::VecDeque;

use futures::{Stream, StreamExt as _, stream};

use crate::api::ChatChunk;
use crate::errors::ApiError;

/// The non-JSON end-of-stream sentinel.
pub(crate) const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit from the response stream.
#[derive(Clone, Debug, PartialEq)]
pub enum WireEvent {
    /// A parsed completion chunk.
    Chunk(ChatChunk),
    /// The `[DONE]` sentinel.
    Done,
    /// A frame that failed validation; consumers skip it and count a warning.
    Malformed { detail: String },
}

/// Incremental SSE frame splitter.
///
/// Frames may arrive split across network chunks; bytes are buffered until a
/// blank-line delimiter completes a frame.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

/// The `data` payload of one complete SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub data: String,
}

impl SseDecoder {
    /// Feeds one network chunk and returns every frame it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, delim_len)) = next_delimiter(&self.buf) {
            let frame_bytes: Vec<u8> = self.buf.drain(..end + delim_len).take(end).collect();
            if let Some(frame) = parse_frame(&frame_bytes) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn next_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    for (i, pair) in buf.windows(2).enumerate() {
        if pair == b"\n\n" {
            return Some((i, 2));
        }
        if pair == b"\r\n" && buf.get(i + 2..i + 4).is_some_and(|next| next == b"\r\n") {
            return Some((i, 4));
        }
    }
    None
}

fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut data_lines = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        // Comment lines keep the connection alive; field names other than
        // `data` never occur on this endpoint.
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        data: data_lines.join("\n"),
    })
}

/// Classifies one frame.
///
/// The sentinel is recognized before any JSON parsing. A well-formed error
/// payload is terminal; anything else that fails to parse is a recoverable
/// `Malformed` event.
pub(crate) fn decode_frame(frame: &SseFrame) -> Result<Option<WireEvent>, ApiError> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == DONE_SENTINEL {
        return Ok(Some(WireEvent::Done));
    }
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            return Ok(Some(WireEvent::Malformed {
                detail: format!("invalid JSON frame: {e}"),
            }));
        }
    };
    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(ApiError::server(message, None));
    }
    match serde_json::from_value::<ChatChunk>(value) {
        Ok(chunk) => Ok(Some(WireEvent::Chunk(chunk))),
        Err(e) => Ok(Some(WireEvent::Malformed {
            detail: format!("unexpected chunk shape: {e}"),
        })),
    }
}

/// Adapts a raw byte stream into a lazy sequence of wire events.
///
/// The sequence ends after the first transport error; it is never restarted
/// and never retried.
pub(crate) fn event_stream<S, E>(source: S) -> impl Stream<Item = Result<WireEvent, ApiError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    struct State<S> {
        source: S,
        decoder: SseDecoder,
        pending: VecDeque<WireEvent>,
        done: bool,
    }

    stream::try_unfold(
        State {
            source,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }
                match state.source.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            if let Some(event) = decode_frame(&frame)? {
                                state.pending.push_back(event);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ApiError::transport(format!("stream read failed: {e}")));
                    }
                    None => state.done = true,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &str) -> SseFrame {
        SseFrame {
            data: data.to_string(),
        }
    }

    #[test]
    fn decoder_reassembles_frames_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let first = decoder.push_chunk(b"data: {\"choices\":[{\"delta\":{\"content\":\"hel");
        assert!(first.is_empty());
        let second = decoder.push_chunk(b"lo\"}}]}\n\ndata: [DONE]\n\n");
        assert_eq!(second.len(), 2);
        assert!(second[0].data.contains("hello"));
        assert_eq!(second[1].data, "[DONE]");
    }

    #[test]
    fn decoder_handles_crlf_delimiters_and_comments() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(b": keep-alive\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "[DONE]");
    }

    #[test]
    fn sentinel_is_recognized_without_json_parsing() {
        let event = decode_frame(&frame("[DONE]")).expect("decode");
        assert_eq!(event, Some(WireEvent::Done));
    }

    #[test]
    fn chunk_frames_parse_into_chunk_events() {
        let event = decode_frame(&frame(
            r#"{"id":"chatcmpl_1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Soft "},"finish_reason":null}]}"#,
        ))
        .expect("decode");
        match event {
            Some(WireEvent::Chunk(chunk)) => assert_eq!(chunk.delta_text(), "Soft "),
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_recoverable_not_terminal() {
        let event = decode_frame(&frame("{not json")).expect("decode must not fail");
        assert!(matches!(event, Some(WireEvent::Malformed { .. })));
    }

    #[test]
    fn server_error_payload_is_terminal() {
        let err = decode_frame(&frame(r#"{"error":"model exploded"}"#)).expect_err("terminal");
        assert!(matches!(err, ApiError::Server { message, .. } if message == "model exploded"));
    }

    #[tokio::test]
    async fn identical_byte_streams_decode_identically() {
        let bytes = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n";
        let decode_all = || async {
            let source = stream::iter(vec![Ok::<_, std::convert::Infallible>(
                bytes::Bytes::from_static(bytes),
            )]);
            event_stream(Box::pin(source))
                .collect::<Vec<_>>()
                .await
        };
        let first = decode_all().await;
        let second = decode_all().await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn transport_error_ends_the_sequence() {
        #[derive(Debug, thiserror::Error)]
        #[error("connection reset")]
        struct Reset;

        let source = stream::iter(vec![
            Ok(bytes::Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            )),
            Err(Reset),
        ]);
        let items = event_stream(Box::pin(source)).collect::<Vec<_>>().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[0],
            Ok(WireEvent::Chunk(ref chunk)) if chunk.delta_text() == "a"
        ));
        assert!(matches!(items[1], Err(ApiError::Transport { .. })));
    }
}

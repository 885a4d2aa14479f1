//! The accumulated completion and the logic that builds it from wire events.

use crate::errors::StreamFailure;
use crate::sse::WireEvent;

/// Why a completion stopped producing text.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TerminationReason {
    /// The model stopped naturally.
    Stop,
    /// Generation hit the token limit.
    Length,
    /// The stream failed; any text accumulated before the failure is retained.
    Error(StreamFailure),
    /// The caller cancelled the stream.
    Cancelled,
}

impl TerminationReason {
    /// Maps a wire `finish_reason` value.
    ///
    /// Unrecognized values are not guessed at; the raw value is preserved in
    /// a protocol failure for diagnostics.
    pub(crate) fn from_finish_reason(raw: &str) -> Self {
        match raw {
            "stop" => Self::Stop,
            "length" => Self::Length,
            other => Self::Error(StreamFailure::Protocol {
                message: format!("unrecognized finish_reason: {other:?}"),
            }),
        }
    }

    /// True for the normal terminal states (`Stop`, `Length`).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stop | Self::Length)
    }
}

/// The cumulative output of one chat run.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Completion {
    /// Assistant text assembled so far; frozen once `finished` is set.
    pub text: String,
    /// Whether a terminal state has been reached.
    pub finished: bool,
    /// Set exactly when `finished` is.
    pub reason: Option<TerminationReason>,
    /// Number of malformed frames skipped while streaming.
    pub warnings: u32,
}

impl Completion {
    /// True when the run ended in a normal terminal state.
    pub fn is_success(&self) -> bool {
        self.reason
            .as_ref()
            .is_some_and(TerminationReason::is_success)
    }
}

/// Observable outcome of applying one wire event.
#[derive(Debug, PartialEq)]
pub(crate) enum Applied {
    /// Non-empty delta text was appended.
    Delta(String),
    /// A terminal state was reached; `trailing_delta` holds text that
    /// arrived in the same event as the finish reason.
    Finished { trailing_delta: Option<String> },
    /// Nothing to surface (empty delta, skipped frame, or already finished).
    Nothing,
}

/// Applies wire events to a [`Completion`] in arrival order.
#[derive(Debug, Default)]
pub(crate) struct DeltaAccumulator {
    completion: Completion,
}

impl DeltaAccumulator {
    /// Consumes one event.
    ///
    /// Events arriving after the terminal state are ignored.
    pub fn apply(&mut self, event: WireEvent) -> Applied {
        if self.completion.finished {
            return Applied::Nothing;
        }
        match event {
            WireEvent::Chunk(chunk) => {
                let delta = chunk.delta_text().to_owned();
                if !delta.is_empty() {
                    self.completion.text.push_str(&delta);
                }
                // The delta lands before the finish transition is evaluated.
                if let Some(raw) = chunk.finish_reason() {
                    self.finish(TerminationReason::from_finish_reason(raw));
                    return Applied::Finished {
                        trailing_delta: (!delta.is_empty()).then_some(delta),
                    };
                }
                if delta.is_empty() {
                    Applied::Nothing
                } else {
                    Applied::Delta(delta)
                }
            }
            WireEvent::Done => {
                self.finish(TerminationReason::Stop);
                Applied::Finished {
                    trailing_delta: None,
                }
            }
            WireEvent::Malformed { .. } => {
                self.completion.warnings += 1;
                Applied::Nothing
            }
        }
    }

    /// Terminates with an error, retaining accumulated text.
    pub fn fail(&mut self, failure: StreamFailure) {
        if !self.completion.finished {
            self.finish(TerminationReason::Error(failure));
        }
    }

    /// Terminates as cancelled, retaining accumulated text.
    pub fn cancel(&mut self) {
        if !self.completion.finished {
            self.finish(TerminationReason::Cancelled);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completion.finished
    }

    pub fn into_completion(self) -> Completion {
        self.completion
    }

    fn finish(&mut self, reason: TerminationReason) {
        self.completion.finished = true;
        self.completion.reason = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatChunk, ChunkChoice, ChunkDelta};

    fn chunk(text: &str, finish: Option<&str>) -> WireEvent {
        WireEvent::Chunk(ChatChunk {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(text.to_string()),
                },
                finish_reason: finish.map(ToOwned::to_owned),
            }],
        })
    }

    #[test]
    fn text_is_ordered_concatenation_of_nonempty_deltas() {
        let mut acc = DeltaAccumulator::default();
        for event in [
            chunk("", None),
            chunk("Soft ", None),
            chunk("woolly ", None),
            chunk("", None),
            chunk("giants", None),
        ] {
            acc.apply(event);
        }
        assert_eq!(acc.apply(WireEvent::Done), Applied::Finished {
            trailing_delta: None
        });
        let completion = acc.into_completion();
        assert_eq!(completion.text, "Soft woolly giants");
        assert_eq!(completion.reason, Some(TerminationReason::Stop));
        assert!(completion.finished);
    }

    #[test]
    fn empty_deltas_surface_nothing() {
        let mut acc = DeltaAccumulator::default();
        assert_eq!(acc.apply(chunk("", None)), Applied::Nothing);
        assert_eq!(
            acc.apply(WireEvent::Chunk(ChatChunk::default())),
            Applied::Nothing
        );
        assert_eq!(acc.into_completion().text, "");
    }

    #[test]
    fn delta_applies_before_finish_transition_in_same_event() {
        let mut acc = DeltaAccumulator::default();
        acc.apply(chunk("partial", None));
        let applied = acc.apply(chunk(" end", Some("stop")));
        assert_eq!(applied, Applied::Finished {
            trailing_delta: Some(" end".to_string())
        });
        let completion = acc.into_completion();
        assert_eq!(completion.text, "partial end");
        assert_eq!(completion.reason, Some(TerminationReason::Stop));
    }

    #[test]
    fn length_finish_reason_is_a_normal_termination() {
        let mut acc = DeltaAccumulator::default();
        acc.apply(chunk("truncated", Some("length")));
        let completion = acc.into_completion();
        assert_eq!(completion.reason, Some(TerminationReason::Length));
        assert!(completion.is_success());
    }

    #[test]
    fn unrecognized_finish_reason_preserves_raw_value() {
        let mut acc = DeltaAccumulator::default();
        acc.apply(chunk("", Some("content_filter")));
        let completion = acc.into_completion();
        match completion.reason {
            Some(TerminationReason::Error(StreamFailure::Protocol { message })) => {
                assert!(message.contains("content_filter"));
            }
            other => panic!("expected protocol failure, got {other:?}"),
        }
    }

    #[test]
    fn malformed_frames_count_warnings_without_touching_text() {
        let mut acc = DeltaAccumulator::default();
        acc.apply(chunk("keep", None));
        acc.apply(WireEvent::Malformed {
            detail: "bad".into(),
        });
        acc.apply(WireEvent::Done);
        let completion = acc.into_completion();
        assert_eq!(completion.text, "keep");
        assert_eq!(completion.warnings, 1);
        assert_eq!(completion.reason, Some(TerminationReason::Stop));
    }

    #[test]
    fn nothing_mutates_after_the_terminal_state() {
        let mut acc = DeltaAccumulator::default();
        acc.apply(chunk("done", Some("stop")));
        assert_eq!(acc.apply(chunk("late", None)), Applied::Nothing);
        assert_eq!(acc.apply(WireEvent::Done), Applied::Nothing);
        acc.fail(StreamFailure::Transport {
            message: "late reset".into(),
        });
        let completion = acc.into_completion();
        assert_eq!(completion.text, "done");
        assert_eq!(completion.reason, Some(TerminationReason::Stop));
    }

    #[test]
    fn failure_retains_partial_text() {
        let mut acc = DeltaAccumulator::default();
        for text in ["Lla", "mas ", "roam."] {
            acc.apply(chunk(text, None));
        }
        acc.fail(StreamFailure::Transport {
            message: "connection reset".into(),
        });
        let completion = acc.into_completion();
        assert_eq!(completion.text, "Llamas roam.");
        assert!(matches!(
            completion.reason,
            Some(TerminationReason::Error(StreamFailure::Transport { .. }))
        ));
    }
}

use crate::completion::Completion;

/// Normalized events yielded by `ChatStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// First event for every run.
    Started { run_id: uuid::Uuid, model: String },
    /// Incremental assistant text. `seq` is strictly increasing within a run.
    Delta {
        run_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    /// Terminal success event (`Stop` or `Length`).
    Completed {
        run_id: uuid::Uuid,
        completion: Completion,
    },
    /// Terminal failure or cancellation; `completion.text` holds whatever
    /// was accumulated before the run ended.
    Failed {
        run_id: uuid::Uuid,
        completion: Completion,
    },
}

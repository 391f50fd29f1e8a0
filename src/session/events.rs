//! Session event stream consumed by front ends.

use serde::{Deserialize, Serialize};

use crate::submission::ScreeningResult;
use crate::types::{Frequency, Level, Trial};

/// How a session reached `Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every frequency ran its full trial count
    Finished,
    /// Ended early by the caller
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new level is being presented
    LevelChanged { frequency: Frequency, level: Level },
    /// A frequency became active (including the first one)
    FrequencyAdvanced { frequency: Frequency },
    /// The tone could not be played; the trial still counts
    ToneFailed { frequency: Frequency, reason: String },
    SessionCompleted {
        trials: Vec<Trial>,
        reason: CompletionReason,
    },
    /// Outcome of a submission attempt; errors carry the message only
    SubmissionResult(Result<ScreeningResult, String>),
}

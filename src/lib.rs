// Hearing Screen Core - adaptive pure-tone screening engine
// Staircase level selection, single-tone scheduling and trial logging

// Module declarations
pub mod audio;
pub mod calibration;
pub mod config;
pub mod error;
pub mod session;
pub mod staircase;
pub mod submission;
pub mod testing;
pub mod types;

// Re-exports for convenience
pub use audio::{ToneBackend, ToneRequest, ToneScheduler};
pub use calibration::{CalibrationEntry, CalibrationSource, CalibrationStore};
pub use config::{AppConfig, SessionConfig};
pub use error::{AudioError, CalibrationError, ErrorCode, SessionError, SubmissionError};
pub use session::{
    CompletionReason, ResponseOutcome, SessionDeps, SessionEvent, SessionStatus, TestSession,
};
pub use staircase::{StaircaseController, StaircaseDecision, StaircasePhase};
pub use submission::{ResultSubmitter, ScreeningResult, Submission};
pub use types::{Frequency, Gender, Level, PatientIdentity, StepSize, Trial};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        assert_eq!(Frequency::SEQUENCE.len(), 5);
        assert_eq!(SessionConfig::default().trials_per_frequency, 7);
        assert_eq!(StepSize::default(), StepSize::Five);
    }
}

// Session error types and constants

use crate::error::{ErrorCode, SubmissionError};
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 3001-3004
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Operation not allowed in the current session/staircase state
    pub const INVALID_STATE_TRANSITION: i32 = 3001;

    /// A required patient identity field is empty
    pub const MISSING_PATIENT_IDENTITY: i32 = 3002;

    /// The external scoring service did not accept the trial log
    pub const SUBMISSION_FAILED: i32 = 3003;

    /// Session configuration is out of range
    pub const INVALID_CONFIG: i32 = 3004;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=TestSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session-level errors surfaced to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Operation rejected for the current state; nothing was mutated
    InvalidStateTransition { state: String, action: String },

    /// Patient identity incomplete
    MissingPatientIdentity { field: String },

    /// Result submission failed; the trial log is retained
    SubmissionFailed { reason: String },

    /// Configuration rejected
    InvalidConfig { reason: String },
}

impl SessionError {
    pub(crate) fn invalid_transition(state: impl fmt::Debug, action: &str) -> Self {
        SessionError::InvalidStateTransition {
            state: format!("{:?}", state),
            action: action.to_string(),
        }
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::InvalidStateTransition { .. } => {
                SessionErrorCodes::INVALID_STATE_TRANSITION
            }
            SessionError::MissingPatientIdentity { .. } => {
                SessionErrorCodes::MISSING_PATIENT_IDENTITY
            }
            SessionError::SubmissionFailed { .. } => SessionErrorCodes::SUBMISSION_FAILED,
            SessionError::InvalidConfig { .. } => SessionErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::InvalidStateTransition { state, action } => {
                format!("Cannot {} while session is {}", action, state)
            }
            SessionError::MissingPatientIdentity { field } => {
                format!("Patient identity incomplete: {} is required", field)
            }
            SessionError::SubmissionFailed { reason } => {
                format!("Result submission failed: {}", reason)
            }
            SessionError::InvalidConfig { reason } => {
                format!("Invalid session configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

impl From<SubmissionError> for SessionError {
    fn from(err: SubmissionError) -> Self {
        SessionError::SubmissionFailed {
            reason: err.message(),
        }
    }
}

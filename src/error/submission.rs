// Submission error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Submission error code constants
///
/// Error code range: 4001-4003
pub struct SubmissionErrorCodes {}

impl SubmissionErrorCodes {
    /// Transport failure (connect, timeout, non-2xx)
    pub const NETWORK: i32 = 4001;

    /// Service answered with a status other than "success"
    pub const REJECTED: i32 = 4002;

    /// Response body did not have the expected shape
    pub const MALFORMED_RESPONSE: i32 = 4003;
}

/// Log a submission error with structured context
pub fn log_submission_error(err: &SubmissionError, context: &str) {
    error!(
        "Submission error in {}: code={}, component=ResultSubmitter, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by a `ResultSubmitter`
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionError {
    Network { reason: String },
    Rejected { status: String, message: String },
    MalformedResponse { reason: String },
}

impl ErrorCode for SubmissionError {
    fn code(&self) -> i32 {
        match self {
            SubmissionError::Network { .. } => SubmissionErrorCodes::NETWORK,
            SubmissionError::Rejected { .. } => SubmissionErrorCodes::REJECTED,
            SubmissionError::MalformedResponse { .. } => SubmissionErrorCodes::MALFORMED_RESPONSE,
        }
    }

    fn message(&self) -> String {
        match self {
            SubmissionError::Network { reason } => format!("Network error: {}", reason),
            SubmissionError::Rejected { status, message } => {
                format!("Scoring service returned status '{}': {}", status, message)
            }
            SubmissionError::MalformedResponse { reason } => {
                format!("Unexpected response shape: {}", reason)
            }
        }
    }
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SubmissionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SubmissionError {}

impl From<reqwest::Error> for SubmissionError {
    fn from(err: reqwest::Error) -> Self {
        SubmissionError::Network {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_error_codes() {
        assert_eq!(
            SubmissionError::Network {
                reason: "x".to_string()
            }
            .code(),
            4001
        );
        assert_eq!(
            SubmissionError::Rejected {
                status: "error".to_string(),
                message: "x".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            SubmissionError::MalformedResponse {
                reason: "x".to_string()
            }
            .code(),
            4003
        );
    }

    #[test]
    fn test_rejected_message() {
        let err = SubmissionError::Rejected {
            status: "error".to_string(),
            message: "Invalid data format".to_string(),
        };
        assert_eq!(
            err.message(),
            "Scoring service returned status 'error': Invalid data format"
        );
    }
}

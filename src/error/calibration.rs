// Calibration error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2004
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// No calibration entry (and no fallback) for the requested frequency
    pub const CALIBRATION_MISSING: i32 = 2001;

    /// The calibration source could not be reached or read
    pub const FETCH_FAILED: i32 = 2002;

    /// The calibration payload could not be parsed
    pub const MALFORMED: i32 = 2003;

    /// An individual entry violates gainFactor > 0 or maxLevel in (0, 120]
    pub const INVALID_ENTRY: i32 = 2004;
}

/// Log a calibration error with structured context
///
/// Logged at warn level because the caller always recovers.
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    warn!(
        "Calibration error in {}: code={}, component=CalibrationStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Every one of these is recovered by falling back to the built-in default
/// table; none blocks test administration.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Frequency has no entry and the store has no fallback
    CalibrationMissing { frequency_hz: u32 },

    /// Source unreachable (network, filesystem)
    FetchFailed { reason: String },

    /// Payload was not a frequency -> entry mapping
    Malformed { reason: String },

    /// Entry violates its invariants
    InvalidEntry { frequency_hz: u32, reason: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::CalibrationMissing { .. } => {
                CalibrationErrorCodes::CALIBRATION_MISSING
            }
            CalibrationError::FetchFailed { .. } => CalibrationErrorCodes::FETCH_FAILED,
            CalibrationError::Malformed { .. } => CalibrationErrorCodes::MALFORMED,
            CalibrationError::InvalidEntry { .. } => CalibrationErrorCodes::INVALID_ENTRY,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::CalibrationMissing { frequency_hz } => {
                format!("No calibration entry for {} Hz", frequency_hz)
            }
            CalibrationError::FetchFailed { reason } => {
                format!("Calibration fetch failed: {}", reason)
            }
            CalibrationError::Malformed { reason } => {
                format!("Malformed calibration data: {}", reason)
            }
            CalibrationError::InvalidEntry {
                frequency_hz,
                reason,
            } => format!("Invalid calibration entry for {} Hz: {}", frequency_hz, reason),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

impl From<std::io::Error> for CalibrationError {
    fn from(err: std::io::Error) -> Self {
        CalibrationError::FetchFailed {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CalibrationError {
    fn from(err: serde_json::Error) -> Self {
        CalibrationError::Malformed {
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for CalibrationError {
    fn from(err: reqwest::Error) -> Self {
        CalibrationError::FetchFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::CalibrationMissing { frequency_hz: 250 }.code(),
            CalibrationErrorCodes::CALIBRATION_MISSING
        );
        assert_eq!(
            CalibrationError::FetchFailed {
                reason: "test".to_string()
            }
            .code(),
            CalibrationErrorCodes::FETCH_FAILED
        );
        assert_eq!(
            CalibrationError::Malformed {
                reason: "test".to_string()
            }
            .code(),
            CalibrationErrorCodes::MALFORMED
        );
        assert_eq!(
            CalibrationError::InvalidEntry {
                frequency_hz: 500,
                reason: "test".to_string()
            }
            .code(),
            CalibrationErrorCodes::INVALID_ENTRY
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::CalibrationMissing { frequency_hz: 250 };
        assert_eq!(err.message(), "No calibration entry for 250 Hz");

        let err = CalibrationError::InvalidEntry {
            frequency_hz: 4000,
            reason: "factor must be positive".to_string(),
        };
        assert_eq!(
            err.message(),
            "Invalid calibration entry for 4000 Hz: factor must be positive"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CalibrationError = json_err.into();
        assert!(matches!(err, CalibrationError::Malformed { .. }));
    }
}

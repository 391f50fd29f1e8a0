// Error types for the hearing screening engine
//
// One enum per domain (audio output, calibration, session control, result
// submission). Every enum carries a stable numeric code so front ends can
// react to conditions without parsing messages.

mod audio;
mod calibration;
mod session;
mod submission;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};
pub use submission::{log_submission_error, SubmissionError, SubmissionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::Mutex;

    struct CapturingLogger {
        records: Mutex<Vec<(Level, String)>>,
    }

    impl Log for CapturingLogger {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    static LOGGER: CapturingLogger = CapturingLogger {
        records: Mutex::new(Vec::new()),
    };

    /// Level of the first captured record containing `marker`
    fn logged_level(marker: &str, emit: impl FnOnce()) -> Option<Level> {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
        emit();
        let records = LOGGER.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .find(|(_, text)| text.contains(marker))
            .map(|(level, _)| *level)
    }

    #[test]
    fn test_recovered_errors_log_at_warn() {
        let audio = AudioError::ToneGenerationFailed {
            reason: "no device".to_string(),
        };
        assert_eq!(
            logged_level("audio-recovered-context", || {
                log_audio_error(&audio, "audio-recovered-context")
            }),
            Some(Level::Warn)
        );

        let calibration = CalibrationError::FetchFailed {
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            logged_level("calibration-recovered-context", || {
                log_calibration_error(&calibration, "calibration-recovered-context")
            }),
            Some(Level::Warn)
        );
    }

    #[test]
    fn test_session_errors_log_at_error() {
        let err = SessionError::InvalidStateTransition {
            state: "Completed".to_string(),
            action: "record_response".to_string(),
        };
        assert_eq!(
            logged_level("session-failure-context", || {
                log_session_error(&err, "session-failure-context")
            }),
            Some(Level::Error)
        );
    }

    #[test]
    fn test_error_code_trait_objects() {
        let errors: Vec<Box<dyn ErrorCode>> = vec![
            Box::new(AudioError::ToneGenerationFailed {
                reason: "no device".to_string(),
            }),
            Box::new(CalibrationError::CalibrationMissing { frequency_hz: 750 }),
            Box::new(SessionError::InvalidStateTransition {
                state: "Completed".to_string(),
                action: "record_response".to_string(),
            }),
            Box::new(SubmissionError::Network {
                reason: "refused".to_string(),
            }),
        ];

        let codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec![1001, 2001, 3001, 4001]);
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), SubmissionError> {
            Err(SubmissionError::Network {
                reason: "timeout".to_string(),
            })
        }

        fn caller() -> Result<(), SessionError> {
            may_fail()?;
            Ok(())
        }

        match caller() {
            Err(SessionError::SubmissionFailed { reason }) => assert!(reason.contains("timeout")),
            other => panic!("Expected SubmissionFailed, got {:?}", other),
        }
    }
}

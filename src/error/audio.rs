// Audio error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1004
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// A tone generator could not be created or started
    pub const TONE_GENERATION_FAILED: i32 = 1001;

    /// No usable output device or stream configuration
    pub const DEVICE_UNAVAILABLE: i32 = 1002;

    /// Tone parameters rejected (zero duration, non-finite amplitude)
    pub const INVALID_TONE: i32 = 1003;

    /// Recording a tone to disk failed
    pub const WRITE_FAILED: i32 = 1004;
}

/// Log an audio error with structured context
///
/// Logged at warn level because the caller always recovers.
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    warn!(
        "Audio error in {}: code={}, component=ToneScheduler, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These cover tone generation and output device access. None of them is
/// fatal to a screening session: the session records the trial and moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Tone generator creation or start failed
    ToneGenerationFailed { reason: String },

    /// Output device missing or unusable
    DeviceUnavailable { reason: String },

    /// Tone request parameters are invalid
    InvalidTone { reason: String },

    /// Writing a recorded tone failed
    WriteFailed { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::ToneGenerationFailed { .. } => AudioErrorCodes::TONE_GENERATION_FAILED,
            AudioError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::InvalidTone { .. } => AudioErrorCodes::INVALID_TONE,
            AudioError::WriteFailed { .. } => AudioErrorCodes::WRITE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::ToneGenerationFailed { reason } => {
                format!("Tone generation failed: {}", reason)
            }
            AudioError::DeviceUnavailable { reason } => {
                format!("Audio output device unavailable: {}", reason)
            }
            AudioError::InvalidTone { reason } => format!("Invalid tone request: {}", reason),
            AudioError::WriteFailed { reason } => format!("Failed to record tone: {}", reason),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::WriteFailed {
            reason: err.to_string(),
        }
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::WriteFailed {
            reason: err.to_string(),
        }
    }
}

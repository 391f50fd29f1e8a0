//! Configuration management
//!
//! Runtime configuration is loaded from a JSON file so the protocol
//! parameters (trial count, start level, step size, timing) and the
//! external endpoints can be changed without recompiling. A missing or
//! malformed file never stops a screening: defaults are used instead.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::calibration::{
    CalibrationSource, FileCalibrationSource, HttpCalibrationSource, StaticCalibrationSource,
};
use crate::error::{SessionError, SubmissionError};
use crate::staircase::StaircaseConfig;
use crate::submission::HttpResultSubmitter;
use crate::types::{Level, StepSize, LEVEL_CEILING_DB};

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub audio: AudioConfig,
    pub calibration: CalibrationSourceConfig,
    pub submission: SubmissionConfig,
}

/// Screening protocol parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Trials recorded at each frequency before advancing
    pub trials_per_frequency: u32,
    /// Level every frequency starts from
    pub start_level_db: u8,
    pub min_level_db: u8,
    pub max_level_db: u8,
    /// Initial staircase step (1, 2 or 5 dB); can be changed mid-session
    pub step_size_db: StepSize,
    pub tone_duration_ms: u64,
    /// Pause between a response and the next tone on the same frequency
    pub inter_trial_gap_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trials_per_frequency: 7,
            start_level_db: 50,
            min_level_db: 0,
            max_level_db: LEVEL_CEILING_DB,
            step_size_db: StepSize::Five,
            tone_duration_ms: 1000,
            inter_trial_gap_ms: 500,
        }
    }
}

impl SessionConfig {
    /// Reject configurations the staircase cannot run
    pub fn validate(&self) -> Result<(), SessionError> {
        let invalid = |reason: String| Err(SessionError::InvalidConfig { reason });

        if self.trials_per_frequency == 0 {
            return invalid("trials_per_frequency must be at least 1".to_string());
        }
        if self.max_level_db > LEVEL_CEILING_DB {
            return invalid(format!(
                "max_level_db {} exceeds {}",
                self.max_level_db, LEVEL_CEILING_DB
            ));
        }
        if self.min_level_db >= self.max_level_db {
            return invalid(format!(
                "empty level range [{}, {}]",
                self.min_level_db, self.max_level_db
            ));
        }
        if !(self.min_level_db..=self.max_level_db).contains(&self.start_level_db) {
            return invalid(format!(
                "start_level_db {} outside [{}, {}]",
                self.start_level_db, self.min_level_db, self.max_level_db
            ));
        }
        if self.tone_duration_ms == 0 {
            return invalid("tone_duration_ms must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn staircase(&self) -> StaircaseConfig {
        StaircaseConfig {
            start_level: Level::new(self.start_level_db),
            floor: Level::new(self.min_level_db),
            ceiling: Level::new(self.max_level_db),
            trials_per_frequency: self.trials_per_frequency,
        }
    }

    pub fn tone_duration(&self) -> Duration {
        Duration::from_millis(self.tone_duration_ms)
    }

    pub fn inter_trial_gap(&self) -> Duration {
        Duration::from_millis(self.inter_trial_gap_ms)
    }
}

/// Tone synthesis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate for rendered (WAV) tones; device output uses the device rate
    pub sample_rate: u32,
    /// Fade-in/out ramp length
    pub fade_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fade_ms: 5,
        }
    }
}

impl AudioConfig {
    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }
}

/// Where the calibration table comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CalibrationSourceConfig {
    /// Built-in table
    #[default]
    Default,
    File { path: PathBuf },
    Http { url: String, timeout_ms: u64 },
}

impl CalibrationSourceConfig {
    pub fn build(&self) -> Box<dyn CalibrationSource> {
        match self {
            CalibrationSourceConfig::Default => Box::new(StaticCalibrationSource::defaults()),
            CalibrationSourceConfig::File { path } => {
                Box::new(FileCalibrationSource::new(path.clone()))
            }
            CalibrationSourceConfig::Http { url, timeout_ms } => Box::new(
                HttpCalibrationSource::new(url.clone(), Duration::from_millis(*timeout_ms)),
            ),
        }
    }
}

/// Scoring service endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/save-results/".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl SubmissionConfig {
    pub fn build(&self) -> Result<HttpResultSubmitter, SubmissionError> {
        HttpResultSubmitter::new(self.endpoint.clone(), Duration::from_millis(self.timeout_ms))
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn load() -> Self {
        Self::load_from_file("assets/screening_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.session.trials_per_frequency, 7);
        assert_eq!(config.session.start_level_db, 50);
        assert_eq!(config.session.step_size_db, StepSize::Five);
        assert_eq!(config.session.inter_trial_gap(), Duration::from_millis(500));
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.calibration, CalibrationSourceConfig::Default);
        assert!(config.session.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "session": {"trials_per_frequency": 3, "step_size_db": 2},
            "calibration": {"source": "http", "url": "http://cal.local/", "timeout_ms": 2000}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.session.trials_per_frequency, 3);
        assert_eq!(config.session.step_size_db, StepSize::Two);
        assert_eq!(config.session.start_level_db, 50);
        assert_eq!(
            config.calibration,
            CalibrationSourceConfig::Http {
                url: "http://cal.local/".to_string(),
                timeout_ms: 2000
            }
        );
    }

    #[test]
    fn test_missing_or_invalid_file_yields_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/screening_config.json");
        assert_eq!(config, AppConfig::default());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert_eq!(AppConfig::load_from_file(file.path()), AppConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let zero_trials = SessionConfig {
            trials_per_frequency: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            zero_trials.validate(),
            Err(SessionError::InvalidConfig { .. })
        ));

        let empty_range = SessionConfig {
            min_level_db: 60,
            max_level_db: 60,
            ..SessionConfig::default()
        };
        assert!(empty_range.validate().is_err());

        let start_outside = SessionConfig {
            start_level_db: 10,
            min_level_db: 20,
            ..SessionConfig::default()
        };
        assert!(start_outside.validate().is_err());
    }

    #[test]
    fn test_staircase_config_mapping() {
        let config = SessionConfig {
            start_level_db: 40,
            max_level_db: 100,
            ..SessionConfig::default()
        };
        let staircase = config.staircase();
        assert_eq!(staircase.start_level, Level::new(40));
        assert_eq!(staircase.ceiling, Level::new(100));
        assert_eq!(staircase.trials_per_frequency, 7);
    }
}

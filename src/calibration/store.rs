// CalibrationStore - level to amplitude mapping
//
// Each test frequency carries a gain correction and a safety ceiling. The
// amplitude handed to the tone generator is
//
//     min(level, max_level) / 100 * gain_factor
//
// so a level above the ceiling is silently capped at the ceiling.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::calibration::source::CalibrationSource;
use crate::error::{log_calibration_error, CalibrationError};
use crate::types::{Frequency, Level, LEVEL_CEILING_DB};

/// Gain factor used when no calibration data is available
pub const DEFAULT_GAIN_FACTOR: f64 = 1.0;
/// Ceiling used when no calibration data is available
pub const DEFAULT_MAX_LEVEL_DB: f64 = 110.0;

/// Correction for one frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    /// Multiplier applied to the normalized level (must be > 0)
    #[serde(rename = "factor")]
    pub gain_factor: f64,
    /// Highest level this frequency may be played at, in (0, 120]
    #[serde(rename = "max_db")]
    pub max_level: f64,
}

impl CalibrationEntry {
    /// Create an entry, checking its invariants
    ///
    /// # Errors
    /// `CalibrationError::InvalidEntry` if `gain_factor <= 0` or `max_level`
    /// falls outside `(0, 120]`.
    pub fn new(
        frequency_hz: u32,
        gain_factor: f64,
        max_level: f64,
    ) -> Result<Self, CalibrationError> {
        if !gain_factor.is_finite() || gain_factor <= 0.0 {
            return Err(CalibrationError::InvalidEntry {
                frequency_hz,
                reason: format!("factor must be positive (got {})", gain_factor),
            });
        }
        if !max_level.is_finite() || max_level <= 0.0 || max_level > f64::from(LEVEL_CEILING_DB) {
            return Err(CalibrationError::InvalidEntry {
                frequency_hz,
                reason: format!(
                    "max_db must be in (0, {}] (got {})",
                    LEVEL_CEILING_DB, max_level
                ),
            });
        }
        Ok(Self {
            gain_factor,
            max_level,
        })
    }

    /// Amplitude for a level after applying the ceiling and gain
    pub fn amplitude(&self, level: Level) -> f64 {
        f64::from(level.db()).min(self.max_level) / 100.0 * self.gain_factor
    }
}

impl Default for CalibrationEntry {
    fn default() -> Self {
        Self {
            gain_factor: DEFAULT_GAIN_FACTOR,
            max_level: DEFAULT_MAX_LEVEL_DB,
        }
    }
}

/// Read-only calibration table
///
/// Built once per session. `fallback` covers frequencies the loaded table
/// does not mention; a strict store without fallback reports
/// `CalibrationMissing` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStore {
    entries: BTreeMap<Frequency, CalibrationEntry>,
    fallback: Option<CalibrationEntry>,
    from_defaults: bool,
}

impl CalibrationStore {
    /// Built-in table: factor 1.0, ceiling 110 dB for every test frequency
    pub fn new_default() -> Self {
        let entries = Frequency::SEQUENCE
            .iter()
            .map(|&f| (f, CalibrationEntry::default()))
            .collect();
        Self {
            entries,
            fallback: Some(CalibrationEntry::default()),
            from_defaults: true,
        }
    }

    /// Store that only knows the given entries
    pub fn strict(entries: BTreeMap<Frequency, CalibrationEntry>) -> Self {
        Self {
            entries,
            fallback: None,
            from_defaults: false,
        }
    }

    /// Store with the given entries, unknown frequencies use the default entry
    pub fn with_default_fallback(entries: BTreeMap<Frequency, CalibrationEntry>) -> Self {
        Self {
            entries,
            fallback: Some(CalibrationEntry::default()),
            from_defaults: false,
        }
    }

    /// Load the table from `source`, falling back to the default table on failure
    ///
    /// An empty table is treated as a failure. Never returns an error.
    pub fn load(source: &dyn CalibrationSource) -> Self {
        match source.fetch() {
            Ok(entries) if entries.is_empty() => {
                warn!(
                    "[Calibration] Source {} returned no usable entries. Using defaults.",
                    source.describe()
                );
                Self::new_default()
            }
            Ok(entries) => {
                info!(
                    "[Calibration] Loaded {} entries from {}",
                    entries.len(),
                    source.describe()
                );
                Self::with_default_fallback(entries)
            }
            Err(err) => {
                log_calibration_error(&err, "load (using default table)");
                Self::new_default()
            }
        }
    }

    /// Whether this store is the built-in default table
    pub fn is_default(&self) -> bool {
        self.from_defaults
    }

    /// Entry in effect for `frequency`
    ///
    /// # Errors
    /// `CalibrationMissing` when the frequency is absent and there is no fallback.
    pub fn entry(&self, frequency: Frequency) -> Result<CalibrationEntry, CalibrationError> {
        self.entries
            .get(&frequency)
            .copied()
            .or(self.fallback)
            .ok_or(CalibrationError::CalibrationMissing {
                frequency_hz: frequency.hz(),
            })
    }

    /// Output amplitude for a level at a frequency
    pub fn amplitude_for(&self, frequency: Frequency, level: Level) -> Result<f64, CalibrationError> {
        self.entry(frequency).map(|entry| entry.amplitude(level))
    }

    /// Effective table across the whole test sequence
    pub fn effective_table(&self) -> Vec<(Frequency, Option<CalibrationEntry>)> {
        Frequency::SEQUENCE
            .iter()
            .map(|&f| (f, self.entry(f).ok()))
            .collect()
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new_default()
    }
}

//! Core vocabulary shared by the staircase, scheduler and session.
//!
//! Levels are integer decibels (dB HL) on a `[0, 120]` scale. The linear
//! gain representation only exists at the very edge, inside
//! `CalibrationStore::amplitude_for`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest presentable level in dB.
pub const LEVEL_FLOOR_DB: u8 = 0;
/// Highest presentable level in dB.
pub const LEVEL_CEILING_DB: u8 = 120;

/// Audiometric test frequency.
///
/// The declaration order is the test order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Frequency {
    Hz500,
    Hz1000,
    Hz2000,
    Hz4000,
    Hz8000,
}

impl Frequency {
    /// Fixed test sequence.
    pub const SEQUENCE: [Frequency; 5] = [
        Frequency::Hz500,
        Frequency::Hz1000,
        Frequency::Hz2000,
        Frequency::Hz4000,
        Frequency::Hz8000,
    ];

    pub fn hz(self) -> u32 {
        match self {
            Frequency::Hz500 => 500,
            Frequency::Hz1000 => 1000,
            Frequency::Hz2000 => 2000,
            Frequency::Hz4000 => 4000,
            Frequency::Hz8000 => 8000,
        }
    }

    pub fn from_hz(hz: u32) -> Option<Frequency> {
        Self::SEQUENCE.iter().copied().find(|f| f.hz() == hz)
    }

    /// Position in the test sequence
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get the next frequency in the test sequence
    ///
    /// # Returns
    /// * `Some(Frequency)` - Next frequency to test
    /// * `None` - Sequence exhausted
    pub fn next(self) -> Option<Frequency> {
        Self::SEQUENCE.get(self.index() + 1).copied()
    }
}

impl TryFrom<u32> for Frequency {
    type Error = String;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        Frequency::from_hz(hz).ok_or_else(|| format!("{} Hz is not a test frequency", hz))
    }
}

impl From<Frequency> for u32 {
    fn from(frequency: Frequency) -> u32 {
        frequency.hz()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

/// Presentation level in dB, always inside `[LEVEL_FLOOR_DB, LEVEL_CEILING_DB]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    pub const FLOOR: Level = Level(LEVEL_FLOOR_DB);
    pub const CEILING: Level = Level(LEVEL_CEILING_DB);

    /// Build a level, clamping into the presentable range.
    pub fn new(db: u8) -> Level {
        Level(db.min(LEVEL_CEILING_DB))
    }

    pub fn db(self) -> u8 {
        self.0
    }

    /// Step down, never below `floor`.
    pub fn lowered(self, step: StepSize, floor: Level) -> Level {
        Level(self.0.saturating_sub(step.db()).max(floor.0))
    }

    /// Step up, never above `ceiling`.
    pub fn raised(self, step: StepSize, ceiling: Level) -> Level {
        Level(self.0.saturating_add(step.db()).min(ceiling.0))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dB", self.0)
    }
}

/// Staircase step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum StepSize {
    One,
    Two,
    #[default]
    Five,
}

impl StepSize {
    pub fn db(self) -> u8 {
        match self {
            StepSize::One => 1,
            StepSize::Two => 2,
            StepSize::Five => 5,
        }
    }
}

impl TryFrom<u8> for StepSize {
    type Error = String;

    fn try_from(db: u8) -> Result<Self, Self::Error> {
        match db {
            1 => Ok(StepSize::One),
            2 => Ok(StepSize::Two),
            5 => Ok(StepSize::Five),
            other => Err(format!("step size must be 1, 2 or 5 dB (got {})", other)),
        }
    }
}

impl From<StepSize> for u8 {
    fn from(step: StepSize) -> u8 {
        step.db()
    }
}

/// One presentation/response pair. Never mutated after it is logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub frequency: Frequency,
    pub level: Level,
    pub heard: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gender {
    #[default]
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

/// Patient identity forwarded verbatim to the scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentity {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub gender: Gender,
    /// ISO date, e.g. `1984-03-21`
    pub birth_date: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl PatientIdentity {
    /// First required field that is blank, if any.
    pub fn missing_required_field(&self) -> Option<&'static str> {
        if self.last_name.trim().is_empty() {
            Some("lastName")
        } else if self.first_name.trim().is_empty() {
            Some("firstName")
        } else if self.birth_date.trim().is_empty() {
            Some("birthDate")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_sequence_order() {
        let hz: Vec<u32> = Frequency::SEQUENCE.iter().map(|f| f.hz()).collect();
        assert_eq!(hz, vec![500, 1000, 2000, 4000, 8000]);
        assert!(Frequency::Hz500 < Frequency::Hz8000);
        assert_eq!(Frequency::Hz4000.next(), Some(Frequency::Hz8000));
        assert_eq!(Frequency::Hz8000.next(), None);
    }

    #[test]
    fn test_frequency_serializes_as_integer() {
        let json = serde_json::to_string(&Frequency::Hz2000).unwrap();
        assert_eq!(json, "2000");
        let parsed: Frequency = serde_json::from_str("8000").unwrap();
        assert_eq!(parsed, Frequency::Hz8000);
        assert!(serde_json::from_str::<Frequency>("750").is_err());
    }

    #[test]
    fn test_level_clamps_at_both_bounds() {
        assert_eq!(Level::new(200), Level::CEILING);
        assert_eq!(Level::new(3).lowered(StepSize::Five, Level::FLOOR), Level::FLOOR);
        assert_eq!(Level::new(118).raised(StepSize::Five, Level::CEILING), Level::CEILING);
        assert_eq!(Level::new(50).lowered(StepSize::Two, Level::FLOOR).db(), 48);
    }

    #[test]
    fn test_step_size_parsing() {
        assert_eq!(StepSize::try_from(2), Ok(StepSize::Two));
        assert!(StepSize::try_from(3).is_err());
        let parsed: StepSize = serde_json::from_str("5").unwrap();
        assert_eq!(parsed, StepSize::Five);
    }

    #[test]
    fn test_trial_wire_shape() {
        let trial = Trial {
            frequency: Frequency::Hz1000,
            level: Level::new(45),
            heard: true,
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let value = serde_json::to_value(&trial).unwrap();
        assert_eq!(value["frequency"], 1000);
        assert_eq!(value["level"], 45);
        assert_eq!(value["heard"], true);
        assert_eq!(value["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_patient_required_fields() {
        let mut patient = PatientIdentity {
            last_name: "Ivanova".to_string(),
            first_name: "Anna".to_string(),
            birth_date: "1990-01-02".to_string(),
            ..Default::default()
        };
        assert_eq!(patient.missing_required_field(), None);

        patient.first_name = "  ".to_string();
        assert_eq!(patient.missing_required_field(), Some("firstName"));

        let json = serde_json::to_value(&patient).unwrap();
        assert!(json.get("lastName").is_some());
        assert_eq!(json["gender"], "M");
    }
}

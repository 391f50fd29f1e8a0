// Calibration module - per-frequency output correction and safety ceiling
//
// This module provides two main components:
// 1. CalibrationStore: read-only table mapping a dB level to output amplitude
// 2. CalibrationSource: where the table comes from (HTTP, JSON file, static)
//
// Loading never fails. Any fetch or parse problem falls back to the
// built-in default table so a screening can always proceed.

pub mod source;
pub mod store;

pub use source::{
    parse_calibration_payload, CalibrationSource, CalibrationTable, FileCalibrationSource,
    HttpCalibrationSource, StaticCalibrationSource,
};
pub use store::{CalibrationEntry, CalibrationStore, DEFAULT_GAIN_FACTOR, DEFAULT_MAX_LEVEL_DB};

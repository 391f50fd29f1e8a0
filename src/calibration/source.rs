//! Calibration sources.
//!
//! The wire format is a JSON object keyed by frequency (`"500"`, `"1000"`,
//! `"500.0"` are all accepted) whose values are `{ "factor": f64,
//! "max_db": f64 }`. Entries for frequencies outside the test sequence and
//! entries that violate their invariants are skipped with a warning; the
//! remaining ones are kept.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;

use crate::calibration::store::CalibrationEntry;
use crate::error::CalibrationError;
use crate::types::Frequency;

pub type CalibrationTable = BTreeMap<Frequency, CalibrationEntry>;

/// Anything that can produce a calibration table.
pub trait CalibrationSource: Send + Sync {
    fn fetch(&self) -> Result<CalibrationTable, CalibrationError>;

    /// Short human-readable origin, used in logs
    fn describe(&self) -> String;
}

/// Parse a calibration payload
///
/// # Errors
/// `Malformed` if the payload is not a JSON object.
pub fn parse_calibration_payload(payload: &str) -> Result<CalibrationTable, CalibrationError> {
    let value: Value = serde_json::from_str(payload)?;
    let object = value.as_object().ok_or_else(|| CalibrationError::Malformed {
        reason: "expected an object keyed by frequency".to_string(),
    })?;

    let mut table = CalibrationTable::new();
    for (key, raw) in object {
        let Some(frequency) = parse_frequency_key(key) else {
            warn!("[Calibration] Ignoring entry for unknown frequency '{}'", key);
            continue;
        };

        match parse_entry(frequency, raw) {
            Ok(entry) => {
                table.insert(frequency, entry);
            }
            Err(err) => warn!("[Calibration] Skipping entry: {}", err),
        }
    }

    Ok(table)
}

fn parse_frequency_key(key: &str) -> Option<Frequency> {
    let hz: f64 = key.trim().parse().ok()?;
    if hz.fract() != 0.0 || hz < 0.0 || hz > f64::from(u32::MAX) {
        return None;
    }
    Frequency::from_hz(hz as u32)
}

fn parse_entry(frequency: Frequency, raw: &Value) -> Result<CalibrationEntry, CalibrationError> {
    let field = |name: &str| {
        raw.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| CalibrationError::InvalidEntry {
                frequency_hz: frequency.hz(),
                reason: format!("missing numeric '{}'", name),
            })
    };
    CalibrationEntry::new(frequency.hz(), field("factor")?, field("max_db")?)
}

/// Fetches the table from an HTTP endpoint (GET, no parameters)
pub struct HttpCalibrationSource {
    url: String,
    timeout: Duration,
}

impl HttpCalibrationSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl CalibrationSource for HttpCalibrationSource {
    fn fetch(&self) -> Result<CalibrationTable, CalibrationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let body = client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .text()?;
        debug!("[Calibration] Received {} bytes from {}", body.len(), self.url);
        parse_calibration_payload(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads the table from a JSON file on disk
pub struct FileCalibrationSource {
    path: PathBuf,
}

impl FileCalibrationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CalibrationSource for FileCalibrationSource {
    fn fetch(&self) -> Result<CalibrationTable, CalibrationError> {
        let contents = fs::read_to_string(&self.path)?;
        parse_calibration_payload(&contents)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory source, mainly for tests and the built-in default table
pub struct StaticCalibrationSource {
    result: Result<CalibrationTable, CalibrationError>,
}

impl StaticCalibrationSource {
    pub fn new(table: CalibrationTable) -> Self {
        Self { result: Ok(table) }
    }

    /// Source yielding the built-in default entry for every frequency
    pub fn defaults() -> Self {
        Self::new(
            Frequency::SEQUENCE
                .iter()
                .map(|&f| (f, CalibrationEntry::default()))
                .collect(),
        )
    }

    /// Source whose fetch always fails with `err`
    pub fn failing(err: CalibrationError) -> Self {
        Self { result: Err(err) }
    }
}

impl CalibrationSource for StaticCalibrationSource {
    fn fetch(&self) -> Result<CalibrationTable, CalibrationError> {
        self.result.clone()
    }

    fn describe(&self) -> String {
        "static table".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationStore;
    use crate::testing::{refused_url, OneShotServer};
    use std::io::Write;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_parse_string_and_decimal_keys() {
        let payload = r#"{
            "500": {"factor": 1.2, "max_db": 100},
            "1000.0": {"factor": 0.9, "max_db": 105.5}
        }"#;
        let table = parse_calibration_payload(payload).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table[&Frequency::Hz500].gain_factor, 1.2);
        assert_eq!(table[&Frequency::Hz1000].max_level, 105.5);
    }

    #[test]
    fn test_parse_skips_unknown_and_invalid_entries() {
        let payload = r#"{
            "250": {"factor": 1.0, "max_db": 100},
            "2000": {"factor": 0, "max_db": 100},
            "4000": {"factor": 1.0},
            "8000": {"factor": 0.7, "max_db": 95}
        }"#;
        let table = parse_calibration_payload(payload).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.contains_key(&Frequency::Hz8000));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = parse_calibration_payload("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, CalibrationError::Malformed { .. }));

        let err = parse_calibration_payload("not json").unwrap_err();
        assert!(matches!(err, CalibrationError::Malformed { .. }));
    }

    #[test]
    fn test_file_source_reads_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"4000": {{"factor": 0.5, "max_db": 90}}}}"#).unwrap();

        let table = FileCalibrationSource::new(file.path()).fetch().unwrap();
        assert_eq!(table[&Frequency::Hz4000].gain_factor, 0.5);
    }

    #[test]
    fn test_file_source_missing_file_is_fetch_failure() {
        let err = FileCalibrationSource::new("/nonexistent/calibration.json")
            .fetch()
            .unwrap_err();
        assert!(matches!(err, CalibrationError::FetchFailed { .. }));
    }

    #[test]
    fn test_http_source_parses_payload() {
        let server = OneShotServer::respond(
            "200 OK",
            r#"{"500": {"factor": 1.1, "max_db": 100}, "8000": {"factor": 0.6, "max_db": 90}}"#,
        )
        .unwrap();

        let table = HttpCalibrationSource::new(server.url("/api/calibration/"), TIMEOUT)
            .fetch()
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[&Frequency::Hz8000].max_level, 90.0);
        assert!(server.request().unwrap().starts_with("GET /api/calibration/ "));
    }

    #[test]
    fn test_http_server_error_falls_back_to_defaults() {
        let server = OneShotServer::respond("500 Internal Server Error", "{}").unwrap();
        let source = HttpCalibrationSource::new(server.url("/"), TIMEOUT);

        let err = source.fetch().unwrap_err();
        assert!(matches!(err, CalibrationError::FetchFailed { .. }));

        let server = OneShotServer::respond("500 Internal Server Error", "{}").unwrap();
        let source = HttpCalibrationSource::new(server.url("/"), TIMEOUT);
        assert!(CalibrationStore::load(&source).is_default());
    }

    #[test]
    fn test_http_refused_connection_falls_back_to_defaults() {
        let source = HttpCalibrationSource::new(refused_url("/").unwrap(), TIMEOUT);

        assert!(matches!(
            source.fetch().unwrap_err(),
            CalibrationError::FetchFailed { .. }
        ));
        assert!(CalibrationStore::load(&source).is_default());
    }
}

// Submission module - hand-off of the trial log to the external scoring service
//
// The engine never computes thresholds itself. It forwards the raw trial log
// plus patient identity and receives a structured result back. Anything that
// is not `status == "success"` with the expected fields is a failure.

pub mod http;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SubmissionError;
use crate::types::{Frequency, PatientIdentity, Trial};

pub use http::HttpResultSubmitter;

/// Request payload: `{ data: [Trial], patient: PatientIdentity }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub data: Vec<Trial>,
    pub patient: PatientIdentity,
}

/// Scoring result returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    /// `None` where no threshold could be established
    pub thresholds: BTreeMap<Frequency, Option<f64>>,
    pub reliabilities: BTreeMap<Frequency, f64>,
    pub diagnosis: String,
    pub recommendations: String,
}

/// External scoring service
pub trait ResultSubmitter: Send + Sync {
    fn submit(&self, submission: &Submission) -> Result<ScreeningResult, SubmissionError>;
}

/// Validate and decode a scoring-service response body
///
/// # Errors
/// - `MalformedResponse` if the body is not JSON, lacks `status`, or lacks
///   any result field
/// - `Rejected` if `status` is anything other than `"success"`
pub fn parse_submission_response(body: &str) -> Result<ScreeningResult, SubmissionError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SubmissionError::MalformedResponse {
            reason: e.to_string(),
        })?;

    let status = value
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| SubmissionError::MalformedResponse {
            reason: "missing 'status'".to_string(),
        })?;

    if status != "success" {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(SubmissionError::Rejected {
            status: status.to_string(),
            message,
        });
    }

    serde_json::from_value(value).map_err(|e| SubmissionError::MalformedResponse {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS: &str = r#"{
        "status": "success",
        "thresholds": {"500": 35.0, "1000": 30.0, "2000": null, "4000": 45.0, "8000": 60.0},
        "reliabilities": {"500": 0.9, "1000": 0.85, "2000": 0.0, "4000": 0.7, "8000": 0.6},
        "diagnosis": "Mild hearing loss",
        "recommendations": "Follow-up in 6 months",
        "tested_frequencies": ["500", "1000"]
    }"#;

    #[test]
    fn test_parse_success_response() {
        let result = parse_submission_response(SUCCESS).unwrap();
        assert_eq!(result.thresholds[&Frequency::Hz500], Some(35.0));
        assert_eq!(result.thresholds[&Frequency::Hz2000], None);
        assert_eq!(result.reliabilities[&Frequency::Hz8000], 0.6);
        assert_eq!(result.diagnosis, "Mild hearing loss");
    }

    #[test]
    fn test_error_status_is_rejected() {
        let err =
            parse_submission_response(r#"{"status": "error", "message": "Invalid data format"}"#)
                .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::Rejected {
                status: "error".to_string(),
                message: "Invalid data format".to_string()
            }
        );
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let err = parse_submission_response(
            r#"{"status": "success", "thresholds": {"500": 1.0}, "diagnosis": "ok"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SubmissionError::MalformedResponse { .. }));

        let err = parse_submission_response("<html>").unwrap_err();
        assert!(matches!(err, SubmissionError::MalformedResponse { .. }));

        let err = parse_submission_response(r#"{"thresholds": {}}"#).unwrap_err();
        assert!(matches!(err, SubmissionError::MalformedResponse { .. }));
    }

    #[test]
    fn test_submission_payload_shape() {
        let submission = Submission {
            data: Vec::new(),
            patient: PatientIdentity {
                last_name: "Petrov".to_string(),
                first_name: "Ivan".to_string(),
                birth_date: "1970-07-07".to_string(),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&submission).unwrap();
        assert!(value["data"].as_array().unwrap().is_empty());
        assert_eq!(value["patient"]["lastName"], "Petrov");
        assert_eq!(value["patient"]["birthDate"], "1970-07-07");
    }
}

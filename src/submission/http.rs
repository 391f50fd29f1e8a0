//! HTTP scoring-service client (JSON POST, blocking).

use std::time::Duration;

use log::{debug, info};

use crate::error::SubmissionError;

use super::{parse_submission_response, ResultSubmitter, ScreeningResult, Submission};

pub struct HttpResultSubmitter {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpResultSubmitter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SubmissionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

impl ResultSubmitter for HttpResultSubmitter {
    fn submit(&self, submission: &Submission) -> Result<ScreeningResult, SubmissionError> {
        info!(
            "[ResultSubmitter] Posting {} trials to {}",
            submission.data.len(),
            self.endpoint
        );
        let response = self.client.post(&self.endpoint).json(submission).send()?;
        let status = response.status();
        let body = response.text()?;
        debug!("[ResultSubmitter] HTTP {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(SubmissionError::Network {
                reason: format!("HTTP {}", status),
            });
        }
        parse_submission_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{refused_url, OneShotServer};
    use crate::types::{Frequency, PatientIdentity};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn submission() -> Submission {
        Submission {
            data: Vec::new(),
            patient: PatientIdentity {
                last_name: "Petrov".to_string(),
                first_name: "Ivan".to_string(),
                birth_date: "1970-07-07".to_string(),
                ..Default::default()
            },
        }
    }

    fn submit_to(url: String) -> Result<ScreeningResult, SubmissionError> {
        HttpResultSubmitter::new(url, TIMEOUT)
            .unwrap()
            .submit(&submission())
    }

    #[test]
    fn test_success_body_becomes_result() {
        let server = OneShotServer::respond(
            "200 OK",
            r#"{"status": "success",
                "thresholds": {"500": 25.0, "1000": null},
                "reliabilities": {"500": 0.8, "1000": 0.0},
                "diagnosis": "n/a", "recommendations": ""}"#,
        )
        .unwrap();

        let result = submit_to(server.url("/api/tests/")).unwrap();
        assert_eq!(result.thresholds[&Frequency::Hz500], Some(25.0));
        assert_eq!(result.thresholds[&Frequency::Hz1000], None);

        let request = server.request().unwrap();
        assert!(request.starts_with("POST /api/tests/ "));
        assert!(request.contains(r#""lastName":"Petrov""#));
    }

    #[test]
    fn test_error_status_in_ok_response_is_rejected() {
        let server = OneShotServer::respond(
            "200 OK",
            r#"{"status": "error", "message": "Invalid data format"}"#,
        )
        .unwrap();

        let err = submit_to(server.url("/")).unwrap_err();
        assert_eq!(
            err,
            SubmissionError::Rejected {
                status: "error".to_string(),
                message: "Invalid data format".to_string()
            }
        );
    }

    #[test]
    fn test_server_error_is_network_failure() {
        let server =
            OneShotServer::respond("500 Internal Server Error", r#"{"status": "success"}"#)
                .unwrap();

        let err = submit_to(server.url("/")).unwrap_err();
        assert_eq!(
            err,
            SubmissionError::Network {
                reason: "HTTP 500 Internal Server Error".to_string()
            }
        );
    }

    #[test]
    fn test_refused_connection_is_network_failure() {
        let err = submit_to(refused_url("/").unwrap()).unwrap_err();
        assert!(matches!(err, SubmissionError::Network { .. }));
    }
}

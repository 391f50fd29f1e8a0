use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::SubmissionError;
use crate::submission::{ResultSubmitter, ScreeningResult, Submission};
use crate::types::{Frequency, Trial};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Placeholder diagnosis; clinical text only ever comes from the service
pub const OFFLINE_DIAGNOSIS: &str = "Not assessed (offline scoring)";
/// Placeholder recommendation
pub const OFFLINE_RECOMMENDATIONS: &str = "";

/// Stand-in for the scoring service in tests and simulations.
///
/// Thresholds follow the service's rule: the quietest level heard at a
/// frequency, none if it was never heard. No diagnosis is made.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineScorer;

impl OfflineScorer {
    pub fn score(&self, trials: &[Trial]) -> ScreeningResult {
        let mut thresholds = BTreeMap::new();
        let mut reliabilities = BTreeMap::new();

        for frequency in Frequency::SEQUENCE {
            let at_frequency: Vec<&Trial> =
                trials.iter().filter(|t| t.frequency == frequency).collect();
            let threshold = at_frequency
                .iter()
                .filter(|t| t.heard)
                .map(|t| t.level)
                .min();

            // Share of answers consistent with "heard iff level >= threshold"
            let reliability = match threshold {
                Some(threshold) if !at_frequency.is_empty() => {
                    let consistent = at_frequency
                        .iter()
                        .filter(|t| t.heard == (t.level >= threshold))
                        .count();
                    consistent as f64 / at_frequency.len() as f64
                }
                _ => 0.0,
            };

            thresholds.insert(frequency, threshold.map(|level| f64::from(level.db())));
            reliabilities.insert(frequency, reliability);
        }

        ScreeningResult {
            thresholds,
            reliabilities,
            diagnosis: OFFLINE_DIAGNOSIS.to_string(),
            recommendations: OFFLINE_RECOMMENDATIONS.to_string(),
        }
    }
}

impl ResultSubmitter for OfflineScorer {
    fn submit(&self, submission: &Submission) -> Result<ScreeningResult, SubmissionError> {
        Ok(self.score(&submission.data))
    }
}

/// Submitter that plays back queued outcomes, then scores offline once the
/// queue is empty. Every submission it receives is kept for inspection.
#[derive(Default)]
pub struct ScriptedSubmitter {
    outcomes: Mutex<VecDeque<Result<ScreeningResult, SubmissionError>>>,
    received: Mutex<Vec<Submission>>,
}

impl ScriptedSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: Result<ScreeningResult, SubmissionError>) {
        lock(&self.outcomes).push_back(outcome);
    }

    pub fn fail_next(&self, err: SubmissionError) {
        self.push_outcome(Err(err));
    }

    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.received).clone()
    }
}

impl ResultSubmitter for ScriptedSubmitter {
    fn submit(&self, submission: &Submission) -> Result<ScreeningResult, SubmissionError> {
        lock(&self.received).push(submission.clone());
        match lock(&self.outcomes).pop_front() {
            Some(outcome) => outcome,
            None => OfflineScorer.submit(submission),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Level, PatientIdentity};
    use chrono::Utc;

    fn trial(frequency: Frequency, db: u8, heard: bool) -> Trial {
        Trial {
            frequency,
            level: Level::new(db),
            heard,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_offline_threshold_is_quietest_heard_level() {
        let trials = vec![
            trial(Frequency::Hz500, 50, true),
            trial(Frequency::Hz500, 45, true),
            trial(Frequency::Hz500, 40, false),
            trial(Frequency::Hz500, 45, true),
            trial(Frequency::Hz1000, 50, false),
        ];
        let result = OfflineScorer.score(&trials);

        assert_eq!(result.thresholds[&Frequency::Hz500], Some(45.0));
        assert_eq!(result.reliabilities[&Frequency::Hz500], 1.0);
        assert_eq!(result.thresholds[&Frequency::Hz1000], None);
        assert_eq!(result.thresholds.len(), 5);
    }

    #[test]
    fn test_offline_result_carries_no_diagnosis() {
        for db in [10, 60, 110] {
            let trials: Vec<Trial> = Frequency::SEQUENCE
                .iter()
                .map(|&f| trial(f, db, true))
                .collect();
            let result = OfflineScorer.score(&trials);
            assert_eq!(result.diagnosis, OFFLINE_DIAGNOSIS);
            assert_eq!(result.recommendations, OFFLINE_RECOMMENDATIONS);
        }
    }

    #[test]
    fn test_scripted_outcomes_then_offline() {
        let submitter = ScriptedSubmitter::new();
        submitter.fail_next(SubmissionError::Network {
            reason: "down".to_string(),
        });

        let submission = Submission {
            data: vec![trial(Frequency::Hz500, 30, true)],
            patient: PatientIdentity::default(),
        };
        assert!(submitter.submit(&submission).is_err());
        let result = submitter.submit(&submission).unwrap();
        assert_eq!(result.thresholds[&Frequency::Hz500], Some(30.0));
        assert_eq!(submitter.submissions().len(), 2);
    }
}

//! TestSession - orchestrates a full screening run
//!
//! Walks the fixed frequency sequence, drives one `StaircaseController`
//! through each frequency, hands every chosen level to the `ToneScheduler`
//! and appends one `Trial` per response to an append-only log. When the
//! last frequency completes (or `end` is called) the log is submitted.
//!
//! The session is driven by its caller one call at a time. All timing
//! (auto-stop, inter-trial gap) lives behind the scheduler's `Timer`.

mod events;

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::audio::{Clock, ToneEvent, ToneRequest, ToneScheduler};
use crate::calibration::{CalibrationEntry, CalibrationSource, CalibrationStore};
use crate::config::SessionConfig;
use crate::error::{log_calibration_error, log_submission_error, ErrorCode, SessionError};
use crate::staircase::{StaircaseController, StaircaseDecision};
use crate::submission::{ResultSubmitter, ScreeningResult, Submission};
use crate::types::{Frequency, Level, PatientIdentity, StepSize, Trial};

pub use events::{CompletionReason, SessionEvent};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    NotStarted,
    Running,
    Completed,
}

/// What happened as a result of a response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// Same frequency, next level scheduled after the inter-trial gap
    NextTrial { frequency: Frequency, level: Level },
    /// Moved on to a new frequency, presented immediately at the start level
    FrequencyAdvanced { frequency: Frequency, level: Level },
    /// That was the last trial; the log has been submitted
    Completed {
        submission: Result<ScreeningResult, SessionError>,
    },
}

/// External collaborators of a session
pub struct SessionDeps {
    pub scheduler: ToneScheduler,
    pub calibration_source: Box<dyn CalibrationSource>,
    pub submitter: Arc<dyn ResultSubmitter>,
    pub clock: Arc<dyn Clock>,
}

pub struct TestSession {
    config: SessionConfig,
    scheduler: ToneScheduler,
    calibration_source: Box<dyn CalibrationSource>,
    calibration: Option<CalibrationStore>,
    submitter: Arc<dyn ResultSubmitter>,
    clock: Arc<dyn Clock>,
    staircase: StaircaseController,
    status: SessionStatus,
    frequency_index: usize,
    trial_log: Vec<Trial>,
    patient: Option<PatientIdentity>,
    /// Frequency and level of the presentation awaiting a response
    presented: Option<(Frequency, Level)>,
    completion: Option<CompletionReason>,
    last_result: Option<ScreeningResult>,
    events: broadcast::Sender<SessionEvent>,
}

impl TestSession {
    /// # Errors
    /// `InvalidConfig` if `config` fails validation
    pub fn new(config: SessionConfig, deps: SessionDeps) -> Result<Self, SessionError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        // Deferred starts fail on the timer's thread, so failures reach the
        // session stream through the scheduler rather than through `present`
        let failures = events.clone();
        deps.scheduler.on_failure(Box::new(move |frequency, err| {
            let _ = failures.send(SessionEvent::ToneFailed {
                frequency,
                reason: err.message(),
            });
        }));

        Ok(Self {
            staircase: StaircaseController::new(config.staircase(), config.step_size_db),
            config,
            scheduler: deps.scheduler,
            calibration_source: deps.calibration_source,
            calibration: None,
            submitter: deps.submitter,
            clock: deps.clock,
            status: SessionStatus::NotStarted,
            frequency_index: 0,
            trial_log: Vec::new(),
            patient: None,
            presented: None,
            completion: None,
            last_result: None,
            events,
        })
    }

    /// Use an already loaded calibration table instead of fetching one
    pub fn with_calibration(mut self, store: CalibrationStore) -> Self {
        self.calibration = Some(store);
        self
    }

    /// Start (or restart) a screening for `patient`
    ///
    /// Clears the trial log, loads calibration on first use, enters the
    /// first frequency and presents its first tone immediately.
    ///
    /// # Errors
    /// - `InvalidStateTransition` while a session is running
    /// - `MissingPatientIdentity` if last name, first name or birth date is blank
    pub fn start(&mut self, patient: PatientIdentity) -> Result<(), SessionError> {
        if self.status == SessionStatus::Running {
            return Err(SessionError::invalid_transition(self.status, "start"));
        }
        if let Some(field) = patient.missing_required_field() {
            return Err(SessionError::MissingPatientIdentity {
                field: field.to_string(),
            });
        }

        if self.calibration.is_none() {
            self.calibration = Some(CalibrationStore::load(self.calibration_source.as_ref()));
        }

        self.trial_log.clear();
        self.last_result = None;
        self.completion = None;
        self.presented = None;
        self.frequency_index = 0;
        self.status = SessionStatus::Running;
        info!(
            "[TestSession] Starting screening for {} {} ({} trials/frequency, step {} dB)",
            patient.first_name,
            patient.last_name,
            self.config.trials_per_frequency,
            self.staircase.step_size().db()
        );
        self.patient = Some(patient);

        self.enter_frequency(Frequency::SEQUENCE[0])?;
        Ok(())
    }

    /// Record the response to the current presentation
    ///
    /// Stops any tone still playing, logs the trial at the level that was
    /// presented, then either schedules the next presentation or completes
    /// and submits the session.
    ///
    /// # Errors
    /// `InvalidStateTransition` if the session is not running. The trial log
    /// is not touched in that case.
    pub fn record_response(&mut self, heard: bool) -> Result<ResponseOutcome, SessionError> {
        if self.status != SessionStatus::Running {
            return Err(SessionError::invalid_transition(
                self.status,
                "record_response",
            ));
        }
        let (frequency, level) = self
            .presented
            .ok_or_else(|| SessionError::invalid_transition(self.status, "record_response"))?;

        self.scheduler.stop();
        let decision = self.staircase.respond(heard)?;

        self.trial_log.push(Trial {
            frequency,
            level,
            heard,
            timestamp: self.clock.now(),
        });
        self.presented = None;

        match decision {
            StaircaseDecision::Present { frequency, level } => {
                self.present(frequency, level, false)?;
                Ok(ResponseOutcome::NextTrial { frequency, level })
            }
            StaircaseDecision::FrequencyComplete { frequency } => {
                self.frequency_index += 1;
                match Frequency::SEQUENCE.get(self.frequency_index).copied() {
                    Some(next) => {
                        info!("[TestSession] {} complete, advancing to {}", frequency, next);
                        let level = self.enter_frequency(next)?;
                        Ok(ResponseOutcome::FrequencyAdvanced {
                            frequency: next,
                            level,
                        })
                    }
                    None => Ok(ResponseOutcome::Completed {
                        submission: self.finish(CompletionReason::Finished),
                    }),
                }
            }
        }
    }

    /// End a running session early and submit what was recorded so far
    ///
    /// # Errors
    /// - `InvalidStateTransition` unless the session is running
    /// - `SubmissionFailed` if the scoring service did not accept the log;
    ///   the session is still completed and the log kept for `resubmit`
    pub fn end(&mut self) -> Result<ScreeningResult, SessionError> {
        if self.status != SessionStatus::Running {
            return Err(SessionError::invalid_transition(self.status, "end"));
        }
        self.finish(CompletionReason::Aborted)
    }

    /// Submit the retained log of a completed session again
    pub fn resubmit(&mut self) -> Result<ScreeningResult, SessionError> {
        if self.status != SessionStatus::Completed {
            return Err(SessionError::invalid_transition(self.status, "resubmit"));
        }
        self.submit()
    }

    /// Change the staircase step; applies from the next level change
    pub fn set_step_size(&mut self, step_size: StepSize) {
        info!("[TestSession] Step size set to {} dB", step_size.db());
        self.staircase.set_step_size(step_size);
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn trial_log(&self) -> &[Trial] {
        &self.trial_log
    }

    pub fn current_frequency(&self) -> Option<Frequency> {
        self.staircase.state().map(|s| s.frequency)
    }

    pub fn current_level(&self) -> Option<Level> {
        self.staircase.current_level()
    }

    pub fn step_size(&self) -> StepSize {
        self.staircase.step_size()
    }

    pub fn patient(&self) -> Option<&PatientIdentity> {
        self.patient.as_ref()
    }

    pub fn calibration(&self) -> Option<&CalibrationStore> {
        self.calibration.as_ref()
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completion
    }

    pub fn last_result(&self) -> Option<&ScreeningResult> {
        self.last_result.as_ref()
    }

    pub fn is_tone_active(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_tones(&self) -> broadcast::Receiver<ToneEvent> {
        self.scheduler.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn enter_frequency(&mut self, frequency: Frequency) -> Result<Level, SessionError> {
        let level = self.staircase.begin(frequency);
        self.emit(SessionEvent::FrequencyAdvanced { frequency });
        self.present(frequency, level, true)?;
        Ok(level)
    }

    /// Hand a level to the scheduler. Audio failures surface as
    /// `SessionEvent::ToneFailed` via the scheduler's failure hook.
    fn present(
        &mut self,
        frequency: Frequency,
        level: Level,
        immediate: bool,
    ) -> Result<(), SessionError> {
        let amplitude = self.amplitude_for(frequency, level);
        let request = ToneRequest::new(frequency, amplitude, self.config.tone_duration());

        let started = if immediate {
            self.scheduler.present(request)
        } else {
            self.scheduler
                .present_after(self.config.inter_trial_gap(), request)
        };
        if let Err(err) = started {
            debug!(
                "[TestSession] No audio for {} at {}: {}. Continuing.",
                frequency,
                level,
                err.message()
            );
        }

        self.staircase.mark_presented()?;
        self.presented = Some((frequency, level));
        self.emit(SessionEvent::LevelChanged { frequency, level });
        Ok(())
    }

    fn amplitude_for(&self, frequency: Frequency, level: Level) -> f64 {
        let lookup = match self.calibration.as_ref() {
            Some(store) => store.amplitude_for(frequency, level),
            None => Ok(CalibrationEntry::default().amplitude(level)),
        };
        lookup.unwrap_or_else(|err| {
            log_calibration_error(&err, "amplitude_for (using default entry)");
            CalibrationEntry::default().amplitude(level)
        })
    }

    fn finish(&mut self, reason: CompletionReason) -> Result<ScreeningResult, SessionError> {
        self.scheduler.stop();
        self.staircase.reset();
        self.presented = None;
        self.status = SessionStatus::Completed;
        self.completion = Some(reason);
        info!(
            "[TestSession] Session completed ({:?}) with {} trials",
            reason,
            self.trial_log.len()
        );
        self.emit(SessionEvent::SessionCompleted {
            trials: self.trial_log.clone(),
            reason,
        });
        self.submit()
    }

    fn submit(&mut self) -> Result<ScreeningResult, SessionError> {
        let patient = self
            .patient
            .clone()
            .ok_or_else(|| SessionError::MissingPatientIdentity {
                field: "lastName".to_string(),
            })?;
        let submission = Submission {
            data: self.trial_log.clone(),
            patient,
        };

        match self.submitter.submit(&submission) {
            Ok(result) => {
                info!("[TestSession] Submission accepted: {}", result.diagnosis);
                self.last_result = Some(result.clone());
                self.emit(SessionEvent::SubmissionResult(Ok(result.clone())));
                Ok(result)
            }
            Err(err) => {
                log_submission_error(&err, "submit");
                self.emit(SessionEvent::SubmissionResult(Err(err.message())));
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

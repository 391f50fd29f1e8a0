//! StaircaseController - per-frequency adaptive level selection
//!
//! Phases: `Presenting -> AwaitingResponse -> Adapting -> (Presenting | FrequencyComplete)`.
//!
//! Heard steps the level down, not heard steps it up, clamped to the
//! configured range. A frequency is complete after a fixed number of trials;
//! there is no convergence check. Every frequency starts from the same level.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::types::{Frequency, Level, StepSize};

/// Where the controller is in the presentation/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaircasePhase {
    /// No frequency active
    Idle,
    /// A level has been chosen and should be presented
    Presenting,
    /// Tone requested; waiting for heard / not heard
    AwaitingResponse,
    /// Computing the next level (transient)
    Adapting,
    /// Trial cap reached for the active frequency
    FrequencyComplete,
}

/// Staircase parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaircaseConfig {
    pub start_level: Level,
    pub floor: Level,
    pub ceiling: Level,
    pub trials_per_frequency: u32,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            start_level: Level::new(50),
            floor: Level::FLOOR,
            ceiling: Level::CEILING,
            trials_per_frequency: 7,
        }
    }
}

/// Transient per-frequency state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaircaseState {
    pub frequency: Frequency,
    pub current_level: Level,
    pub trial_count: u32,
    pub step_size: StepSize,
}

/// Outcome of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaircaseDecision {
    /// Present again at this level
    Present { frequency: Frequency, level: Level },
    /// Trial cap reached; state has been discarded
    FrequencyComplete { frequency: Frequency },
}

pub struct StaircaseController {
    config: StaircaseConfig,
    step_size: StepSize,
    state: Option<StaircaseState>,
    phase: StaircasePhase,
}

impl StaircaseController {
    pub fn new(config: StaircaseConfig, step_size: StepSize) -> Self {
        Self {
            config,
            step_size,
            state: None,
            phase: StaircasePhase::Idle,
        }
    }

    /// Enter `frequency` at the configured start level
    ///
    /// Replaces whatever state was active. Returns the first level to present.
    pub fn begin(&mut self, frequency: Frequency) -> Level {
        let start = self
            .config
            .start_level
            .max(self.config.floor)
            .min(self.config.ceiling);
        self.state = Some(StaircaseState {
            frequency,
            current_level: start,
            trial_count: 0,
            step_size: self.step_size,
        });
        self.phase = StaircasePhase::Presenting;
        debug!("[Staircase] Begin {} at {}", frequency, start);
        start
    }

    /// Record that the current level has been handed to the scheduler
    pub fn mark_presented(&mut self) -> Result<(), SessionError> {
        if self.phase != StaircasePhase::Presenting {
            return Err(SessionError::invalid_transition(self.phase, "present"));
        }
        self.phase = StaircasePhase::AwaitingResponse;
        Ok(())
    }

    /// Apply a response to the level currently awaiting one
    ///
    /// # Errors
    /// `InvalidStateTransition` unless a presentation is awaiting a response;
    /// state is left untouched in that case.
    pub fn respond(&mut self, heard: bool) -> Result<StaircaseDecision, SessionError> {
        let state = match (self.phase, self.state.as_mut()) {
            (StaircasePhase::AwaitingResponse, Some(state)) => state,
            _ => return Err(SessionError::invalid_transition(self.phase, "respond")),
        };
        self.phase = StaircasePhase::Adapting;

        state.trial_count += 1;
        let frequency = state.frequency;

        if state.trial_count >= self.config.trials_per_frequency {
            debug!(
                "[Staircase] {} complete after {} trials",
                frequency, state.trial_count
            );
            self.state = None;
            self.phase = StaircasePhase::FrequencyComplete;
            return Ok(StaircaseDecision::FrequencyComplete { frequency });
        }

        let next = if heard {
            state
                .current_level
                .lowered(state.step_size, self.config.floor)
        } else {
            state
                .current_level
                .raised(state.step_size, self.config.ceiling)
        };
        debug!(
            "[Staircase] {} trial {} heard={} {} -> {}",
            frequency, state.trial_count, heard, state.current_level, next
        );
        state.current_level = next;
        self.phase = StaircasePhase::Presenting;
        Ok(StaircaseDecision::Present {
            frequency,
            level: next,
        })
    }

    /// Change the step size; applies from the next transition on
    pub fn set_step_size(&mut self, step_size: StepSize) {
        self.step_size = step_size;
        if let Some(state) = self.state.as_mut() {
            state.step_size = step_size;
        }
    }

    pub fn step_size(&self) -> StepSize {
        self.step_size
    }

    pub fn phase(&self) -> StaircasePhase {
        self.phase
    }

    pub fn state(&self) -> Option<&StaircaseState> {
        self.state.as_ref()
    }

    pub fn current_level(&self) -> Option<Level> {
        self.state.map(|s| s.current_level)
    }

    pub fn config(&self) -> &StaircaseConfig {
        &self.config
    }

    /// Drop any active state
    pub fn reset(&mut self) {
        self.state = None;
        self.phase = StaircasePhase::Idle;
    }
}

#[cfg(test)]
#[path = "staircase_tests.rs"]
mod tests;

//! ToneScheduler - owns the single active tone
//!
//! Guarantees:
//! - At most one live `ToneHandle` at any time. Every start first releases
//!   the previous handle, under the same lock, before the backend is asked
//!   for a new one.
//! - Every started tone is released, either by `stop`, by the next
//!   `present`, or by its own auto-stop timer.
//! - Auto-stop and deferred starts carry the generation they were scheduled
//!   for; if anything happened since, they do nothing.
//!
//! The handle never leaves this module.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::audio::backend::{Timer, ToneBackend, ToneHandle, ToneRequest};
use crate::error::{log_audio_error, AudioError, ErrorCode};
use crate::types::Frequency;

/// Why a tone stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` was called
    Manual,
    /// Tone duration elapsed
    AutoStop,
    /// A new presentation replaced it
    Replaced,
}

/// Lifecycle events for tones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToneEvent {
    Started {
        frequency: Frequency,
        amplitude: f64,
    },
    Stopped {
        frequency: Frequency,
        reason: StopReason,
    },
    Failed {
        frequency: Frequency,
        reason: String,
    },
}

/// Called on every failed presentation, including deferred ones
pub type ToneFailureHook = Box<dyn Fn(Frequency, &AudioError) + Send + Sync>;

struct ActiveTone {
    generation: u64,
    request: ToneRequest,
    handle: Box<dyn ToneHandle>,
}

#[derive(Default)]
struct ToneSlot {
    /// Bumped by every present/stop; stale timers compare against it
    generation: u64,
    active: Option<ActiveTone>,
}

struct SchedulerShared {
    backend: Arc<dyn ToneBackend>,
    timer: Arc<dyn Timer>,
    slot: Mutex<ToneSlot>,
    events: broadcast::Sender<ToneEvent>,
    failure_hook: Mutex<Option<ToneFailureHook>>,
}

impl SchedulerShared {
    /// Slot contents stay consistent even if a holder panicked, so a
    /// poisoned lock is recovered rather than propagated.
    fn lock_slot(&self) -> MutexGuard<'_, ToneSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| {
            warn!("[ToneScheduler] Recovering poisoned tone slot");
            poisoned.into_inner()
        })
    }

    fn report_failure(&self, frequency: Frequency, err: &AudioError) {
        log_audio_error(err, "present");
        let _ = self.events.send(ToneEvent::Failed {
            frequency,
            reason: err.message(),
        });
        let hook = self
            .failure_hook
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hook) = hook.as_ref() {
            hook(frequency, err);
        }
    }

    fn teardown(&self, slot: &mut ToneSlot, reason: StopReason) {
        if let Some(active) = slot.active.take() {
            let frequency = active.request.frequency;
            active.handle.release();
            debug!(
                "[ToneScheduler] Released tone gen={} at {} ({:?})",
                active.generation, frequency, reason
            );
            let _ = self.events.send(ToneEvent::Stopped { frequency, reason });
        }
    }

    fn start_locked(
        self: &Arc<Self>,
        slot: &mut ToneSlot,
        generation: u64,
        request: ToneRequest,
    ) -> Result<(), AudioError> {
        debug_assert!(slot.active.is_none(), "previous tone must be released first");

        let handle = match self.backend.start_tone(&request) {
            Ok(handle) => handle,
            Err(err) => {
                let err = match err {
                    AudioError::ToneGenerationFailed { .. } => err,
                    other => AudioError::ToneGenerationFailed {
                        reason: other.message(),
                    },
                };
                self.report_failure(request.frequency, &err);
                return Err(err);
            }
        };

        info!(
            "[ToneScheduler] Tone gen={} {} amp={:.4} for {:?} via {}",
            generation,
            request.frequency,
            request.amplitude,
            request.duration,
            self.backend.name()
        );
        let _ = self.events.send(ToneEvent::Started {
            frequency: request.frequency,
            amplitude: request.amplitude,
        });

        let duration = request.duration;
        slot.active = Some(ActiveTone {
            generation,
            request,
            handle,
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        self.timer.schedule(
            duration,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.auto_stop(generation);
                }
            }),
        );
        Ok(())
    }

    fn auto_stop(&self, generation: u64) {
        let mut slot = self.lock_slot();
        match slot.active.as_ref() {
            Some(active) if active.generation == generation => {
                self.teardown(&mut slot, StopReason::AutoStop);
            }
            _ => debug!("[ToneScheduler] Auto-stop gen={} is stale, ignoring", generation),
        }
    }

    fn deferred_start(self: &Arc<Self>, generation: u64, request: ToneRequest) {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            debug!(
                "[ToneScheduler] Deferred start gen={} superseded by gen={}",
                generation, slot.generation
            );
            return;
        }
        // Failure is already reported inside start_locked
        let _ = self.start_locked(&mut slot, generation, request);
    }
}

/// Single-tone scheduler
pub struct ToneScheduler {
    shared: Arc<SchedulerShared>,
}

impl ToneScheduler {
    pub fn new(backend: Arc<dyn ToneBackend>, timer: Arc<dyn Timer>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(SchedulerShared {
                backend,
                timer,
                slot: Mutex::new(ToneSlot::default()),
                events,
                failure_hook: Mutex::new(None),
            }),
        }
    }

    /// Install a hook run whenever a presentation fails, replacing any
    /// previous one. Runs with the tone slot locked; it must not call back
    /// into the scheduler.
    pub fn on_failure(&self, hook: ToneFailureHook) {
        *self
            .shared
            .failure_hook
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(hook);
    }

    fn validated(&self, request: &ToneRequest) -> Result<(), AudioError> {
        request.validate().map_err(|err| {
            self.shared.report_failure(request.frequency, &err);
            err
        })
    }

    /// Present a tone now
    ///
    /// Releases any active tone first, then starts the new one and schedules
    /// its auto-stop after `request.duration`.
    ///
    /// # Errors
    /// - `InvalidTone` for a zero duration or non-finite amplitude
    /// - `ToneGenerationFailed` if the backend could not start; no tone is
    ///   active afterwards
    pub fn present(&self, request: ToneRequest) -> Result<(), AudioError> {
        self.validated(&request)?;

        let mut slot = self.shared.lock_slot();
        slot.generation += 1;
        let generation = slot.generation;
        self.shared.teardown(&mut slot, StopReason::Replaced);
        self.shared.start_locked(&mut slot, generation, request)
    }

    /// Present a tone after `delay`
    ///
    /// Any active tone is released immediately. The deferred start is
    /// cancelled by a later `present`, `present_after` or `stop`. A backend
    /// failure at start time is logged, broadcast as `ToneEvent::Failed` and
    /// passed to the failure hook.
    pub fn present_after(&self, delay: Duration, request: ToneRequest) -> Result<(), AudioError> {
        self.validated(&request)?;

        let generation = {
            let mut slot = self.shared.lock_slot();
            slot.generation += 1;
            self.shared.teardown(&mut slot, StopReason::Replaced);
            slot.generation
        };

        let weak = Arc::downgrade(&self.shared);
        self.shared.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.deferred_start(generation, request);
                }
            }),
        );
        Ok(())
    }

    /// Stop the active tone and cancel any pending start. Idempotent.
    pub fn stop(&self) {
        let mut slot = self.shared.lock_slot();
        slot.generation += 1;
        self.shared.teardown(&mut slot, StopReason::Manual);
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock_slot().active.is_some()
    }

    /// Request of the tone currently playing, if any
    pub fn active_tone(&self) -> Option<ToneRequest> {
        self.shared
            .lock_slot()
            .active
            .as_ref()
            .map(|active| active.request.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToneEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for ToneScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

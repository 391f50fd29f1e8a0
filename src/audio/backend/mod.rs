//! Backend abstractions for tone output.
//!
//! `ToneScheduler` never touches an audio API directly. It asks a
//! [`ToneBackend`] for a tone and receives an owned [`ToneHandle`]; releasing
//! the handle must fully tear down whatever the backend allocated before it
//! returns. Time is injected the same way through [`Timer`] and [`Clock`].

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AudioError;
use crate::types::Frequency;

#[cfg(feature = "cpal-output")]
mod cpal;
#[cfg(feature = "cpal-output")]
pub use self::cpal::CpalToneBackend;

mod silent;
mod wav;

pub use silent::SilentToneBackend;
pub use wav::WavToneBackend;

/// One tone to present.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneRequest {
    pub frequency: Frequency,
    /// Calibrated linear amplitude; clamped to [0, 1] at synthesis time
    pub amplitude: f64,
    pub duration: Duration,
}

impl ToneRequest {
    pub fn new(frequency: Frequency, amplitude: f64, duration: Duration) -> Self {
        Self {
            frequency,
            amplitude,
            duration,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), AudioError> {
        if self.duration.is_zero() {
            return Err(AudioError::InvalidTone {
                reason: "duration must be greater than zero".to_string(),
            });
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(AudioError::InvalidTone {
                reason: format!("amplitude must be finite and >= 0 (got {})", self.amplitude),
            });
        }
        Ok(())
    }
}

/// Exclusively owned live tone.
///
/// `release` is synchronous: when it returns, the generator and any device
/// stream behind it are gone.
pub trait ToneHandle: Send {
    fn release(self: Box<Self>);
}

/// Trait implemented by tone output backends.
pub trait ToneBackend: Send + Sync {
    fn start_tone(&self, request: &ToneRequest) -> Result<Box<dyn ToneHandle>, AudioError>;

    fn name(&self) -> &'static str;
}

/// Deferred task runner used for auto-stop and inter-trial gaps.
pub trait Timer: Send + Sync {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>);
}

/// Timer that sleeps on a short-lived background thread per task.
#[derive(Default)]
pub struct ThreadTimer {
    _unit: (),
}

impl Timer for ThreadTimer {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) {
        let spawned = thread::Builder::new()
            .name("tone-timer".to_string())
            .spawn(move || {
                thread::sleep(delay);
                task();
            });
        if let Err(err) = spawned {
            log::error!("[ToneScheduler] Failed to spawn timer thread: {}", err);
        }
    }
}

/// Trait representing a wall-clock source used for trial timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock backed by `Utc::now`.
#[derive(Default)]
pub struct SystemClock {
    _unit: (),
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_tone_request_validation() {
        let ok = ToneRequest::new(Frequency::Hz1000, 0.5, Duration::from_millis(1000));
        assert!(ok.validate().is_ok());

        let zero = ToneRequest::new(Frequency::Hz1000, 0.5, Duration::ZERO);
        assert!(matches!(
            zero.validate(),
            Err(AudioError::InvalidTone { .. })
        ));

        let nan = ToneRequest::new(Frequency::Hz1000, f64::NAN, Duration::from_millis(10));
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_thread_timer_runs_task() {
        let (tx, rx) = mpsc::channel();
        ThreadTimer::default().schedule(
            Duration::from_millis(1),
            Box::new(move || {
                let _ = tx.send(42);
            }),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(42));
    }
}

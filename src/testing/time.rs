use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::audio::backend::{Clock, Timer};

/// Safety valve for `run_until_idle` when tasks keep rescheduling themselves.
const MAX_IDLE_STEPS: usize = 10_000;

struct PendingTask {
    due: Duration,
    seq: u64,
    task: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
struct TimerState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// Virtual-time `Timer`. Nothing fires until the test advances time.
///
/// Tasks run on the caller's thread, in due order, without the timer lock
/// held, so a task may schedule further tasks.
#[derive(Default)]
pub struct ManualTimer {
    state: Mutex<TimerState>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Move virtual time forward, running every task that becomes due.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        while let Some(task) = self.pop_due(target) {
            task();
        }
        let mut state = self.lock();
        if state.now < target {
            state.now = target;
        }
    }

    /// Jump straight to each next due task until nothing is pending.
    pub fn run_until_idle(&self) {
        for _ in 0..MAX_IDLE_STEPS {
            let next_due = self.lock().pending.iter().map(|t| t.due).min();
            match next_due {
                Some(due) => {
                    let by = due.saturating_sub(self.now());
                    self.advance(by);
                }
                None => return,
            }
        }
        log::warn!("[ManualTimer] Still busy after {} steps", MAX_IDLE_STEPS);
    }

    fn pop_due(&self, target: Duration) -> Option<Box<dyn FnOnce() + Send>> {
        let mut state = self.lock();
        let index = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        let next = state.pending.swap_remove(index);
        state.now = next.due;
        Some(next.task)
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(PendingTask { due, seq, task });
    }
}

/// Deterministic clock.
///
/// Each call to `now()` advances by a fixed step so trial timestamps are
/// strictly increasing and reproducible.
pub struct StubClock {
    start: DateTime<Utc>,
    step_ms: i64,
    offset_ms: AtomicI64,
}

impl StubClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            start,
            step_ms: i64::try_from(step.as_millis()).unwrap_or(i64::MAX),
            offset_ms: AtomicI64::new(0),
        }
    }
}

impl Default for StubClock {
    /// 2024-01-01T00:00:00Z, one second per reading
    fn default() -> Self {
        let start = DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_secs(1_704_067_200));
        Self::new(start, Duration::from_secs(1))
    }
}

impl Clock for StubClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.offset_ms.fetch_add(self.step_ms, Ordering::SeqCst);
        self.start + chrono::Duration::milliseconds(ms)
    }
}

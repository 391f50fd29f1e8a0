use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::backend::{ToneBackend, ToneHandle, ToneRequest};
use crate::error::AudioError;

#[derive(Default)]
struct RecorderState {
    live: usize,
    max_live: usize,
    released: usize,
    requests: Vec<ToneRequest>,
    failures_remaining: usize,
    fail_always: bool,
}

fn lock(state: &Mutex<RecorderState>) -> MutexGuard<'_, RecorderState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Backend that only counts: starts, releases, and how many handles were
/// ever alive at once. Can be told to fail.
#[derive(Default)]
pub struct RecordingToneBackend {
    state: Arc<Mutex<RecorderState>>,
}

impl RecordingToneBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` start attempts
    pub fn fail_next(&self, count: usize) {
        lock(&self.state).failures_remaining = count;
    }

    pub fn set_fail_always(&self, fail: bool) {
        lock(&self.state).fail_always = fail;
    }

    pub fn started(&self) -> usize {
        lock(&self.state).requests.len()
    }

    pub fn released(&self) -> usize {
        lock(&self.state).released
    }

    pub fn live(&self) -> usize {
        lock(&self.state).live
    }

    /// Highest number of simultaneously live handles seen so far
    pub fn max_concurrent(&self) -> usize {
        lock(&self.state).max_live
    }

    pub fn requests(&self) -> Vec<ToneRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn last_request(&self) -> Option<ToneRequest> {
        lock(&self.state).requests.last().cloned()
    }
}

struct RecordingToneHandle {
    state: Arc<Mutex<RecorderState>>,
}

impl ToneHandle for RecordingToneHandle {
    fn release(self: Box<Self>) {}
}

impl Drop for RecordingToneHandle {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.live = state.live.saturating_sub(1);
        state.released += 1;
    }
}

impl ToneBackend for RecordingToneBackend {
    fn start_tone(&self, request: &ToneRequest) -> Result<Box<dyn ToneHandle>, AudioError> {
        let mut state = lock(&self.state);
        if state.fail_always || state.failures_remaining > 0 {
            state.failures_remaining = state.failures_remaining.saturating_sub(1);
            return Err(AudioError::DeviceUnavailable {
                reason: "recording backend told to fail".to_string(),
            });
        }
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.requests.push(request.clone());
        Ok(Box::new(RecordingToneHandle {
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

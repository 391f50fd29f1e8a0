use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::AudioError;

use super::{ToneBackend, ToneHandle, ToneRequest};

/// Backend that accepts every tone and plays nothing.
///
/// Used for headless runs and simulations. Counters let callers confirm
/// that every started tone was also released.
#[derive(Default)]
pub struct SilentToneBackend {
    counters: Arc<SilentCounters>,
}

#[derive(Default)]
struct SilentCounters {
    started: AtomicU64,
    released: AtomicU64,
}

impl SilentToneBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> u64 {
        self.counters.started.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }
}

struct SilentToneHandle {
    counters: Arc<SilentCounters>,
}

impl ToneHandle for SilentToneHandle {
    fn release(self: Box<Self>) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl ToneBackend for SilentToneBackend {
    fn start_tone(&self, request: &ToneRequest) -> Result<Box<dyn ToneHandle>, AudioError> {
        log::debug!(
            "[SilentBackend] {} at amplitude {:.4} for {:?}",
            request.frequency,
            request.amplitude,
            request.duration
        );
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SilentToneHandle {
            counters: Arc::clone(&self.counters),
        }))
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frequency;
    use std::time::Duration;

    #[test]
    fn test_counts_start_and_release() {
        let backend = SilentToneBackend::new();
        let request = ToneRequest::new(Frequency::Hz500, 0.5, Duration::from_millis(10));

        let handle = backend.start_tone(&request).unwrap();
        assert_eq!(backend.started(), 1);
        assert_eq!(backend.released(), 0);

        handle.release();
        assert_eq!(backend.released(), 1);
    }
}

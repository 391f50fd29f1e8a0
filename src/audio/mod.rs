// Audio module - tone synthesis, output backends and the single-tone scheduler

pub mod backend;
pub mod scheduler;
pub mod tone;

pub use backend::{
    Clock, SilentToneBackend, SystemClock, ThreadTimer, Timer, ToneBackend, ToneHandle,
    ToneRequest, WavToneBackend,
};
#[cfg(feature = "cpal-output")]
pub use backend::CpalToneBackend;
pub use scheduler::{StopReason, ToneEvent, ToneFailureHook, ToneScheduler};
pub use tone::{render_tone, ToneOscillator};

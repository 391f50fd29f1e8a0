//! Tone - sample-accurate sine tone synthesis
//!
//! This module provides deterministic pure-tone generation for the screening.
//! Key features:
//! - Phase-accumulator sine oscillator (no drift over long tones)
//! - Linear fade in/out so tone edges do not click
//! - Output amplitude clamped to [0.0, 1.0] whatever the calibration says
//! - Pure functions for offline rendering (WAV backend, tests)

use std::f64::consts::TAU;
use std::time::Duration;

/// Clamp a calibrated amplitude to a safe output gain.
///
/// Non-finite input produces silence.
#[inline]
pub fn clamp_amplitude(amplitude: f64) -> f32 {
    if amplitude.is_finite() {
        amplitude.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Number of samples covering `duration` at `sample_rate`.
#[inline]
pub fn samples_for(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64).round() as u64
}

/// Streaming sine oscillator with a bounded length and fade envelope.
///
/// After `total_samples` the oscillator only produces zeros, so an output
/// stream that outlives its tone stays silent.
#[derive(Debug, Clone)]
pub struct ToneOscillator {
    phase: f64,
    phase_step: f64,
    amplitude: f32,
    fade_samples: u64,
    total_samples: u64,
    position: u64,
}

impl ToneOscillator {
    pub fn new(
        frequency_hz: f64,
        amplitude: f64,
        sample_rate: u32,
        duration: Duration,
        fade: Duration,
    ) -> Self {
        let total_samples = samples_for(duration, sample_rate);
        let fade_samples = samples_for(fade, sample_rate).min(total_samples / 2);
        Self {
            phase: 0.0,
            phase_step: frequency_hz / sample_rate.max(1) as f64,
            amplitude: clamp_amplitude(amplitude),
            fade_samples,
            total_samples,
            position: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.total_samples
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    fn envelope(&self) -> f32 {
        if self.fade_samples == 0 {
            return 1.0;
        }
        let attack = self.position as f32 / self.fade_samples as f32;
        let release = (self.total_samples - self.position) as f32 / self.fade_samples as f32;
        attack.min(release).min(1.0)
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let value = (self.phase * TAU).sin() as f32 * self.amplitude * self.envelope();
        self.phase += self.phase_step;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.position += 1;
        value
    }

    /// Fill an interleaved buffer, writing the same sample to every channel.
    pub fn fill_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks_mut(channels) {
            let sample = self.next_sample();
            for slot in frame.iter_mut() {
                *slot = sample;
            }
        }
    }
}

/// Render a whole tone into memory (mono).
pub fn render_tone(
    frequency_hz: f64,
    amplitude: f64,
    sample_rate: u32,
    duration: Duration,
    fade: Duration,
) -> Vec<f32> {
    let mut osc = ToneOscillator::new(frequency_hz, amplitude, sample_rate, duration, fade);
    let mut samples = Vec::with_capacity(osc.total_samples() as usize);
    while !osc.is_finished() {
        samples.push(osc.next_sample());
    }
    samples
}

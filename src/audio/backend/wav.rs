//! WAV recorder backend.
//!
//! Each presented tone is rendered offline and written to
//! `<dir>/tone_<seq>_<hz>hz.wav` (mono, 32-bit float). Useful for checking
//! calibration output on a machine without speakers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::tone::render_tone;
use crate::error::{AudioError, ErrorCode};

use super::{ToneBackend, ToneHandle, ToneRequest};

pub struct WavToneBackend {
    dir: PathBuf,
    sample_rate: u32,
    fade: Duration,
    sequence: AtomicU64,
}

impl WavToneBackend {
    /// Create the backend, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>, sample_rate: u32, fade: Duration) -> Result<Self, AudioError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            sample_rate,
            fade,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, path: &Path, samples: &[f32]) -> Result<(), AudioError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

struct RecordedToneHandle;

impl ToneHandle for RecordedToneHandle {
    fn release(self: Box<Self>) {}
}

impl ToneBackend for WavToneBackend {
    fn start_tone(&self, request: &ToneRequest) -> Result<Box<dyn ToneHandle>, AudioError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self
            .dir
            .join(format!("tone_{:03}_{}hz.wav", seq, request.frequency.hz()));

        let samples = render_tone(
            f64::from(request.frequency.hz()),
            request.amplitude,
            self.sample_rate,
            request.duration,
            self.fade,
        );
        self.write(&path, &samples)
            .map_err(|err| AudioError::ToneGenerationFailed {
                reason: format!("{}: {}", path.display(), err.message()),
            })?;

        log::debug!("[WavBackend] Wrote {}", path.display());
        Ok(Box::new(RecordedToneHandle))
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frequency;

    #[test]
    fn test_writes_numbered_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = WavToneBackend::new(dir.path(), 8_000, Duration::ZERO).unwrap();

        let request = ToneRequest::new(Frequency::Hz1000, 0.5, Duration::from_millis(250));
        backend.start_tone(&request).unwrap().release();
        backend
            .start_tone(&ToneRequest::new(
                Frequency::Hz2000,
                0.5,
                Duration::from_millis(250),
            ))
            .unwrap()
            .release();

        let first = dir.path().join("tone_001_1000hz.wav");
        assert!(first.exists());
        assert!(dir.path().join("tone_002_2000hz.wav").exists());

        let reader = hound::WavReader::open(first).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 2_000);
    }
}

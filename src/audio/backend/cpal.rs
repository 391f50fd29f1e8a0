//! CPAL-based tone backend for desktop platforms (Linux, macOS, Windows)
//!
//! `cpal::Stream` cannot move between threads, so each tone owns a small
//! output thread that opens the stream, reports whether it started, and
//! parks until the handle is released. Releasing the handle signals the
//! thread and joins it, so the stream is closed before `release` returns.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::tone::ToneOscillator;
use crate::error::AudioError;

use super::{ToneBackend, ToneHandle, ToneRequest};

/// Tone backend playing through the default output device
pub struct CpalToneBackend {
    fade: Duration,
}

impl CpalToneBackend {
    pub fn new(fade: Duration) -> Self {
        Self { fade }
    }
}

struct CpalToneHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalToneHandle {
    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[CpalBackend] Output thread panicked during teardown");
            }
        }
    }
}

impl ToneHandle for CpalToneHandle {
    fn release(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for CpalToneHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_tone_stream(request: &ToneRequest, fade: Duration) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceUnavailable {
            reason: "No default output device found".to_string(),
        })?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceUnavailable {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::DeviceUnavailable {
            reason: "Only F32 sample format is currently supported for output".to_string(),
        });
    }

    let stream_config: cpal::StreamConfig = config.into();
    let channels = stream_config.channels as usize;
    let mut oscillator = ToneOscillator::new(
        f64::from(request.frequency.hz()),
        request.amplitude,
        stream_config.sample_rate.0,
        request.duration,
        fade,
    );

    let err_fn = |err| log::error!("[CpalBackend] Output stream error: {}", err);

    device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                oscillator.fill_interleaved(data, channels);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::ToneGenerationFailed {
            reason: format!("{:?}", e),
        })
}

impl ToneBackend for CpalToneBackend {
    fn start_tone(&self, request: &ToneRequest) -> Result<Box<dyn ToneHandle>, AudioError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let request = request.clone();
        let fade = self.fade;

        let thread = thread::Builder::new()
            .name("tone-output".to_string())
            .spawn(move || {
                let stream = match open_tone_stream(&request, fade) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::ToneGenerationFailed {
                        reason: format!("Output start failed: {}", e),
                    }));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Park until released (or the handle is dropped)
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| AudioError::ToneGenerationFailed {
                reason: format!("Failed to spawn output thread: {}", e),
            })?;

        let mut handle = CpalToneHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(handle)),
            Ok(Err(err)) => {
                handle.shutdown();
                Err(err)
            }
            Err(_) => {
                handle.shutdown();
                Err(AudioError::ToneGenerationFailed {
                    reason: "Output thread exited before reporting status".to_string(),
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

//! Audio playback to speakers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig, SupportedStreamConfigRange};

use crate::{Error, Result};

/// Plays mono PCM16 audio, blocking until it has finished
pub trait AudioSink {
    /// Play `samples` at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot play the audio
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()>;
}

/// Plays audio to the default output device
pub struct SpeakerPlayback {
    gain: f32,
}

fn supports(c: &SupportedStreamConfigRange, channels: u16, rate: u32) -> bool {
    c.channels() == channels
        && c.min_sample_rate() <= SampleRate(rate)
        && c.max_sample_rate() >= SampleRate(rate)
}

impl SpeakerPlayback {
    /// Create a playback sink
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new(gain: f32) -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            gain,
            "audio playback initialized"
        );

        Ok(Self { gain })
    }

    /// Mono if the device offers it at `rate`, otherwise stereo
    fn stream_config(device: &cpal::Device, rate: u32) -> Result<StreamConfig> {
        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 1, rate))
            .or_else(|| {
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2, rate))
            })
            .ok_or_else(|| Error::Audio(format!("no output config for {rate} Hz")))?;

        Ok(supported.with_sample_rate(SampleRate(rate)).config())
    }
}

impl AudioSink for SpeakerPlayback {
    fn play(&mut self, samples: &[i16], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        if sample_rate == 0 {
            return Err(Error::Audio("sample rate must be non-zero".to_string()));
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = Self::stream_config(&device, sample_rate)?;
        let channels = usize::from(config.channels);

        let gain = self.gain;
        let pcm: Arc<[f32]> = samples
            .iter()
            .map(|&s| (f32::from(s) / 32768.0 * gain).clamp(-1.0, 1.0))
            .collect();
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let pcm = Arc::clone(&pcm);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);

                        for frame in data.chunks_mut(channels) {
                            let sample = pcm.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Release);
                                0.0
                            });
                            frame.fill(sample);
                            if pos < pcm.len() {
                                pos += 1;
                            }
                        }

                        position.store(pos, Ordering::Relaxed);
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let sample_count = u64::try_from(pcm.len()).unwrap_or(u64::MAX);
        let duration_ms = sample_count.saturating_mul(1000) / u64::from(sample_rate);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Acquire) {
            if start.elapsed() > timeout {
                tracing::warn!(?timeout, "playback did not drain in time");
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        // Let the device flush its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = pcm.len(), sample_rate, "playback complete");

        Ok(())
    }
}

//! Audio capture from microphone

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Samples kept while nobody reads (two seconds)
const MAX_BUFFERED: usize = SAMPLE_RATE as usize * 2;

/// How long a read waits before the device is considered stalled
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// A blocking source of mono PCM16 frames at [`SAMPLE_RATE`]
pub trait AudioSource {
    /// Fill `frame` completely, blocking until enough audio arrived
    ///
    /// # Errors
    ///
    /// Returns error if the device failed or stopped delivering audio
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<()>;

    /// Drop audio buffered but not yet read
    fn discard_pending(&mut self) {}
}

/// Scale a float sample by `gain` and convert to PCM16
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn apply_gain(sample: f32, gain: f32) -> i16 {
    (sample * gain * 32767.0).clamp(-32768.0, 32767.0) as i16
}

#[derive(Default)]
struct Shared {
    samples: Mutex<VecDeque<i16>>,
    ready: Condvar,
}

/// Captures audio from the default input device
pub struct MicCapture {
    shared: Arc<Shared>,
    _stream: Stream,
}

impl MicCapture {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if no input device is available or the stream fails
    pub fn open(gain: f32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        let shared = Arc::new(Shared::default());
        let writer = Arc::clone(&shared);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let Ok(mut buf) = writer.samples.lock() else {
                        return;
                    };
                    buf.extend(data.iter().map(|&s| apply_gain(s, gain)));
                    let overflow = buf.len().saturating_sub(MAX_BUFFERED);
                    buf.drain(..overflow);
                    writer.ready.notify_all();
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            gain,
            "audio capture started"
        );

        Ok(Self {
            shared,
            _stream: stream,
        })
    }
}

impl AudioSource for MicCapture {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<()> {
        let needed = frame.len();
        if needed > MAX_BUFFERED {
            return Err(Error::Audio(format!(
                "frame of {needed} samples exceeds capture buffer"
            )));
        }

        let guard = self
            .shared
            .samples
            .lock()
            .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;

        let (mut buf, wait) = self
            .shared
            .ready
            .wait_timeout_while(guard, STALL_TIMEOUT, |buf| buf.len() < needed)
            .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;

        if wait.timed_out() && buf.len() < needed {
            return Err(Error::Audio("microphone stopped delivering audio".to_string()));
        }

        for (dst, src) in frame.iter_mut().zip(buf.drain(..needed)) {
            *dst = src;
        }
        Ok(())
    }

    fn discard_pending(&mut self) {
        if let Ok(mut buf) = self.shared.samples.lock() {
            tracing::trace!(samples = buf.len(), "discarding pending capture");
            buf.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_scales_and_clamps() {
        assert_eq!(apply_gain(0.5, 1.0), 16383);
        assert_eq!(apply_gain(0.5, 2.0), 32767);
        assert_eq!(apply_gain(0.9, 4.0), 32767);
        assert_eq!(apply_gain(-0.9, 4.0), -32768);
        assert_eq!(apply_gain(0.0, 8.0), 0);
    }
}

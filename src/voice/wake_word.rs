//! Wake word detection
//!
//! Detectors consume fixed-size PCM16 frames from the microphone and report
//! when the listener should wake up. The bundled detector is energy based:
//! it fires once the signal has stayed above a loudness threshold for long
//! enough.

use std::time::Duration;

use super::SAMPLE_RATE;
use crate::config::WakeWordConfig;
use crate::{Error, Result};

/// Decides, frame by frame, whether the wake word was heard
pub trait WakeWordDetector: Send {
    /// Number of samples expected per frame
    fn frame_len(&self) -> usize;

    /// Feed one frame; returns true on detection
    fn detect(&mut self, frame: &[i16]) -> bool;

    /// Forget any partial detection
    fn reset(&mut self) {}
}

impl<T: WakeWordDetector + ?Sized> WakeWordDetector for Box<T> {
    fn frame_len(&self) -> usize {
        (**self).frame_len()
    }

    fn detect(&mut self, frame: &[i16]) -> bool {
        (**self).detect(frame)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Fires after sustained loud input
#[derive(Debug, Clone)]
pub struct EnergyDetector {
    threshold: f32,
    trigger_samples: usize,
    active_samples: usize,
    frame_len: usize,
}

impl EnergyDetector {
    /// Create a detector
    ///
    /// # Arguments
    ///
    /// * `threshold` - RMS level in `(0, 1]` a frame must exceed
    /// * `trigger` - how long the level must be held
    /// * `frame_len` - samples per frame
    ///
    /// # Errors
    ///
    /// Returns error if the threshold is out of range or `frame_len` is zero
    pub fn new(threshold: f32, trigger: Duration, frame_len: usize) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::WakeWord(format!(
                "threshold must be within (0, 1], got {threshold}"
            )));
        }
        if frame_len == 0 {
            return Err(Error::WakeWord("frame length must be non-zero".to_string()));
        }

        let trigger_samples = usize::try_from(
            trigger.as_millis() * u128::from(SAMPLE_RATE) / 1000,
        )
        .unwrap_or(usize::MAX);

        tracing::debug!(threshold, ?trigger, frame_len, "energy detector initialized");

        Ok(Self {
            threshold,
            trigger_samples,
            active_samples: 0,
            frame_len,
        })
    }
}

impl WakeWordDetector for EnergyDetector {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn detect(&mut self, frame: &[i16]) -> bool {
        let energy = rms(frame);

        if energy <= self.threshold {
            self.active_samples = 0;
            return false;
        }

        self.active_samples += frame.len();
        tracing::trace!(energy, active = self.active_samples, "speech energy");

        if self.active_samples >= self.trigger_samples {
            tracing::info!(energy, "wake word detected");
            self.active_samples = 0;
            return true;
        }

        false
    }

    fn reset(&mut self) {
        self.active_samples = 0;
    }
}

/// Build the detector named in the config
///
/// # Errors
///
/// Returns error if the detector name is unknown or its settings are invalid
pub fn from_config(config: &WakeWordConfig) -> Result<Box<dyn WakeWordDetector>> {
    match config.detector.trim().to_lowercase().as_str() {
        "energy" => Ok(Box::new(EnergyDetector::new(
            config.threshold,
            config.trigger,
            config.frame_len,
        )?)),
        other => Err(Error::WakeWord(format!("unknown detector: {other}"))),
    }
}

/// RMS level of PCM16 samples, normalized to `0..=1`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

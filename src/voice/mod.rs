//! Voice processing module
//!
//! Handles audio capture, wake word detection, the remote speech round trip
//! and playback. A turn runs on a dedicated thread (see `pipeline.rs`).

mod capture;
mod cloud;
pub mod container;
mod pipeline;
mod playback;
mod wake_word;

pub use capture::{AudioSource, MicCapture, SAMPLE_RATE, apply_gain};
pub use cloud::{HttpCloud, VoiceCloud, extract_text};
pub use container::{ContainerError, DecodedAudio};
pub use pipeline::{PipelinePhase, TurnOutcome, TurnSettings, VoicePipeline, spawn};
pub use playback::{AudioSink, SpeakerPlayback};
pub use wake_word::{EnergyDetector, WakeWordDetector, from_config as detector_from_config, rms};

//! Voice turn pipeline
//!
//! A turn runs strictly in sequence on one dedicated thread:
//!
//! ```text
//! listen ─► detected ─► capture ─► transcribe ─► ask ─► synthesize ─► speak
//!   ▲                                  │          │          │          │
//!   └──────────── abort on empty / failed step ───┴──────────┴──────────┘
//! ```
//!
//! Every step reports its mood through the state actor, so the face reacts
//! while the turn is in flight. A failed step ends the turn and the
//! pipeline goes back to listening. Only a microphone that fails while
//! listening, or a stopped state actor, ends the pipeline itself.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use super::container::{self, ContainerError};
use super::{
    AudioSink, AudioSource, HttpCloud, MicCapture, SAMPLE_RATE, SpeakerPlayback, VoiceCloud,
    WakeWordDetector, wake_word,
};
use crate::config::VoiceConfig;
use crate::face::ExpressionKind;
use crate::state::{StateHandle, StateUpdate};
use crate::{Error, Result};

/// Samples read per capture chunk
const CAPTURE_CHUNK: usize = 512;

/// Where a turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Listening,
    Detected,
    Capturing,
    Transcribing,
    Asking,
    Synthesizing,
    Speaking,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listening => "listening",
            Self::Detected => "detected",
            Self::Capturing => "capturing",
            Self::Transcribing => "transcribing",
            Self::Asking => "asking",
            Self::Synthesizing => "synthesizing",
            Self::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was played
    Spoke { samples: usize },
    /// The microphone failed while recording the request
    CaptureFailed(String),
    /// Transcription failed or heard nothing
    NoTranscript,
    /// The assistant failed or had nothing to say
    NoReply,
    /// Synthesis failed or returned less than a header
    NoSpeech,
    /// Synthesized audio could not be decoded
    BadAudio(ContainerError),
    /// The speaker rejected the audio
    PlaybackFailed(String),
}

/// Per-turn capture settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSettings {
    /// Samples recorded after the wake word
    pub capture_samples: usize,
}

impl TurnSettings {
    /// Settings for a capture window of `window`
    #[must_use]
    pub fn from_capture(window: Duration) -> Self {
        let capture_samples =
            usize::try_from(window.as_millis() * u128::from(SAMPLE_RATE) / 1000)
                .unwrap_or(usize::MAX);
        Self { capture_samples }
    }
}

/// Wake word → capture → transcribe → ask → synthesize → speak
pub struct VoicePipeline<S, D, C, K> {
    source: S,
    detector: D,
    cloud: C,
    sink: K,
    state: StateHandle,
    settings: TurnSettings,
}

impl<S, D, C, K> VoicePipeline<S, D, C, K>
where
    S: AudioSource,
    D: WakeWordDetector,
    C: VoiceCloud,
    K: AudioSink,
{
    pub const fn new(
        source: S,
        detector: D,
        cloud: C,
        sink: K,
        state: StateHandle,
        settings: TurnSettings,
    ) -> Self {
        Self {
            source,
            detector,
            cloud,
            sink,
            state,
            settings,
        }
    }

    /// Listen and run turns until `stop` is set
    ///
    /// # Errors
    ///
    /// Returns error if the microphone fails or the state actor stops
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        while self.wait_for_wake_word(stop)? {
            let outcome = self.run_turn()?;
            tracing::info!(?outcome, "voice turn finished");

            self.source.discard_pending();
            self.detector.reset();
        }

        tracing::debug!("voice pipeline stopped");
        Ok(())
    }

    /// Feed frames to the detector until it fires
    ///
    /// Returns false once `stop` is set.
    ///
    /// # Errors
    ///
    /// Returns error if the microphone fails
    pub fn wait_for_wake_word(&mut self, stop: &AtomicBool) -> Result<bool> {
        let mut frame = vec![0i16; self.detector.frame_len()];
        tracing::debug!(phase = %PipelinePhase::Listening, "waiting for wake word");

        while !stop.load(Ordering::Relaxed) {
            self.source.read_frame(&mut frame)?;
            if self.detector.detect(&frame) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Run one turn after the wake word was detected
    ///
    /// Microphone and remote failures end the turn with a [`TurnOutcome`]
    /// rather than an error.
    ///
    /// # Errors
    ///
    /// Returns error if the state actor stops
    pub fn run_turn(&mut self) -> Result<TurnOutcome> {
        tracing::info!(phase = %PipelinePhase::Detected, "wake word heard");
        self.state.apply_blocking(StateUpdate::Mood {
            expression: ExpressionKind::Puzzled,
            talking: false,
        })?;

        let captured = self.capture();
        self.state.apply_blocking(StateUpdate::Mood {
            expression: ExpressionKind::Neutral,
            talking: false,
        })?;
        let samples = match captured {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(phase = %PipelinePhase::Capturing, error = %e, "turn aborted");
                return Ok(TurnOutcome::CaptureFailed(e.to_string()));
            }
        };

        tracing::debug!(phase = %PipelinePhase::Transcribing, samples = samples.len());
        let recording = container::encode_samples(&samples, SAMPLE_RATE, 1);
        let transcript = match self.cloud.transcribe(&recording) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return Ok(TurnOutcome::NoTranscript),
            Err(e) => {
                tracing::warn!(phase = %PipelinePhase::Transcribing, error = %e, "turn aborted");
                return Ok(TurnOutcome::NoTranscript);
            }
        };

        tracing::debug!(phase = %PipelinePhase::Asking, transcript = %transcript);
        let reply = match self.cloud.ask(&transcript) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return Ok(TurnOutcome::NoReply),
            Err(e) => {
                tracing::warn!(phase = %PipelinePhase::Asking, error = %e, "turn aborted");
                return Ok(TurnOutcome::NoReply);
            }
        };

        tracing::debug!(phase = %PipelinePhase::Synthesizing, reply = %reply);
        let speech = match self.cloud.synthesize(&reply) {
            Ok(bytes) if bytes.len() >= container::HEADER_LEN => bytes,
            Ok(_) => return Ok(TurnOutcome::NoSpeech),
            Err(e) => {
                tracing::warn!(phase = %PipelinePhase::Synthesizing, error = %e, "turn aborted");
                return Ok(TurnOutcome::NoSpeech);
            }
        };

        let audio = match container::decode(&speech) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "synthesized audio rejected");
                return Ok(TurnOutcome::BadAudio(e));
            }
        };
        if audio.is_truncated() {
            tracing::debug!(
                declared = audio.declared_len,
                received = audio.pcm.len(),
                "synthesized audio truncated"
            );
        }
        let pcm = audio.to_mono();

        tracing::debug!(
            phase = %PipelinePhase::Speaking,
            samples = pcm.len(),
            sample_rate = audio.sample_rate
        );
        self.state.apply_blocking(StateUpdate::Mood {
            expression: ExpressionKind::Happy,
            talking: true,
        })?;
        let played = self.sink.play(&pcm, audio.sample_rate);
        self.state.apply_blocking(StateUpdate::Talking {
            on: Some(false),
            hold: None,
        })?;

        Ok(match played {
            Ok(()) => TurnOutcome::Spoke { samples: pcm.len() },
            Err(e) => {
                tracing::warn!(error = %e, "playback failed");
                TurnOutcome::PlaybackFailed(e.to_string())
            }
        })
    }

    /// Record the capture window
    ///
    /// # Errors
    ///
    /// Returns error if the microphone fails
    pub fn capture(&mut self) -> Result<Vec<i16>> {
        let total = self.settings.capture_samples;
        tracing::debug!(phase = %PipelinePhase::Capturing, samples = total);

        let mut samples = vec![0i16; total];
        for chunk in samples.chunks_mut(CAPTURE_CHUNK) {
            self.source.read_frame(chunk)?;
        }
        Ok(samples)
    }
}

/// Start the device-backed pipeline on its own thread
///
/// Setup failures are logged and end the thread; the rest of the avatar
/// keeps running.
///
/// # Errors
///
/// Returns error if the thread cannot be spawned
pub fn spawn(
    config: VoiceConfig,
    state: StateHandle,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("voice-turn".to_string())
        .spawn(move || {
            if let Err(e) = run_with_devices(&config, state, &stop) {
                tracing::error!(error = %e, "voice pipeline terminated");
            }
        })
        .map_err(Error::Io)
}

fn run_with_devices(config: &VoiceConfig, state: StateHandle, stop: &AtomicBool) -> Result<()> {
    let detector = wake_word::from_config(&config.wake_word)?;
    let cloud = HttpCloud::from_config(config)?;
    let sink = SpeakerPlayback::new(config.speaker_gain)?;
    let source = MicCapture::open(config.mic_gain)?;

    let mut pipeline = VoicePipeline::new(
        source,
        detector,
        cloud,
        sink,
        state,
        TurnSettings::from_capture(config.capture),
    );

    tracing::info!(detector = %config.wake_word.detector, "voice pipeline listening");
    pipeline.run(stop)
}

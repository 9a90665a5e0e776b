//! Configuration management for the Rigo avatar

pub mod file;

use std::path::Path;
use std::time::Duration;

use crate::Result;

/// Avatar configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Control surface server
    pub api_server: ApiServerConfig,

    /// Face animation
    pub face: FaceConfig,

    /// Voice turn pipeline
    pub voice: VoiceConfig,
}

/// Control surface server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind
    pub bind: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Face animation timing
#[derive(Debug, Clone)]
pub struct FaceConfig {
    /// Device name shown in the caption (e.g. "rigo: happy")
    pub name: String,

    /// Main animation tick
    pub tick: Duration,

    /// Quick blink timer
    pub blink_fast: Duration,

    /// Slow blink timer
    pub blink_slow: Duration,

    /// Expression demo cycle, off when `None`
    pub demo_cycle: Option<Duration>,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            name: "rigo".to_string(),
            tick: Duration::from_millis(130),
            blink_fast: Duration::from_millis(220),
            blink_slow: Duration::from_millis(2800),
            demo_cycle: None,
        }
    }
}

/// Voice pipeline configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Run the voice pipeline
    pub enabled: bool,

    /// Speech-to-text endpoint
    pub stt_url: Option<String>,

    /// Assistant endpoint
    pub assistant_url: Option<String>,

    /// Text-to-speech endpoint
    pub tts_url: Option<String>,

    /// Bearer token attached to every outbound call
    pub bearer_token: Option<String>,

    /// Capture window after the wake word
    pub capture: Duration,

    /// Linear microphone gain
    pub mic_gain: f32,

    /// Linear speaker gain
    pub speaker_gain: f32,

    pub stt_timeout: Duration,
    pub assistant_timeout: Duration,
    pub tts_timeout: Duration,

    /// Wake word detector
    pub wake_word: WakeWordConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            stt_url: None,
            assistant_url: None,
            tts_url: None,
            bearer_token: None,
            capture: Duration::from_millis(4000),
            mic_gain: 1.0,
            speaker_gain: 1.0,
            stt_timeout: Duration::from_secs(20),
            assistant_timeout: Duration::from_secs(20),
            tts_timeout: Duration::from_secs(30),
            wake_word: WakeWordConfig::default(),
        }
    }
}

impl VoiceConfig {
    /// Whether all three remote endpoints are set
    #[must_use]
    pub const fn has_endpoints(&self) -> bool {
        self.stt_url.is_some() && self.assistant_url.is_some() && self.tts_url.is_some()
    }
}

/// Wake word detector configuration
#[derive(Debug, Clone)]
pub struct WakeWordConfig {
    /// Detector implementation name
    pub detector: String,

    /// RMS level (0..1) a frame must exceed to count as active
    pub threshold: f32,

    /// Sustained activity needed to trigger
    pub trigger: Duration,

    /// Samples per detector frame
    pub frame_len: usize,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            detector: "energy".to_string(),
            threshold: 0.03,
            trigger: Duration::from_millis(300),
            frame_len: 512,
        }
    }
}

fn truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be read or parsed
    pub fn load(path: Option<&Path>, disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        Ok(Self::resolve(fc, disable_voice, |key| std::env::var(key).ok()))
    }

    /// Merge sources with priority env > toml > default
    #[must_use]
    pub fn resolve(
        fc: file::AvatarConfigFile,
        disable_voice: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env_ms = |key: &str| env(key).and_then(|v| v.parse::<u64>().ok());

        // API server (env > toml > default)
        let server_default = ApiServerConfig::default();
        let api_server = ApiServerConfig {
            bind: env("RIGO_BIND")
                .or(fc.server.bind)
                .unwrap_or(server_default.bind),
            port: env("RIGO_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(server_default.port),
        };

        // Face (toml > default)
        let face_default = FaceConfig::default();
        let face = FaceConfig {
            name: fc.face.name.unwrap_or(face_default.name),
            tick: fc
                .face
                .tick_ms
                .filter(|ms| *ms > 0)
                .map_or(face_default.tick, Duration::from_millis),
            blink_fast: fc
                .face
                .blink_fast_ms
                .filter(|ms| *ms > 0)
                .map_or(face_default.blink_fast, Duration::from_millis),
            blink_slow: fc
                .face
                .blink_slow_ms
                .filter(|ms| *ms > 0)
                .map_or(face_default.blink_slow, Duration::from_millis),
            demo_cycle: fc
                .face
                .demo_cycle_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        };

        // Wake word (toml > default)
        let ww_default = WakeWordConfig::default();
        let wake_word = WakeWordConfig {
            detector: fc.wake_word.detector.unwrap_or(ww_default.detector),
            threshold: fc.wake_word.threshold.unwrap_or(ww_default.threshold),
            trigger: fc
                .wake_word
                .trigger_ms
                .map_or(ww_default.trigger, Duration::from_millis),
            frame_len: fc.wake_word.frame_len.unwrap_or(ww_default.frame_len),
        };

        // Voice (env > toml > default)
        let voice_default = VoiceConfig::default();
        let mut voice = VoiceConfig {
            enabled: !disable_voice
                && !env("RIGO_DISABLE_VOICE").is_some_and(|v| truthy(&v))
                && fc.voice.enabled.unwrap_or(true),
            stt_url: env("RIGO_STT_URL").or(fc.voice.stt_url),
            assistant_url: env("RIGO_ASSISTANT_URL").or(fc.voice.assistant_url),
            tts_url: env("RIGO_TTS_URL").or(fc.voice.tts_url),
            bearer_token: env("RIGO_BEARER_TOKEN").or(fc.voice.bearer_token),
            capture: env_ms("RIGO_CAPTURE_MS")
                .or(fc.voice.capture_ms)
                .filter(|ms| *ms > 0)
                .map_or(voice_default.capture, Duration::from_millis),
            mic_gain: fc.voice.mic_gain.unwrap_or(voice_default.mic_gain),
            speaker_gain: fc.voice.speaker_gain.unwrap_or(voice_default.speaker_gain),
            stt_timeout: fc
                .voice
                .stt_timeout_ms
                .filter(|ms| *ms > 0)
                .map_or(voice_default.stt_timeout, Duration::from_millis),
            assistant_timeout: fc
                .voice
                .assistant_timeout_ms
                .filter(|ms| *ms > 0)
                .map_or(voice_default.assistant_timeout, Duration::from_millis),
            tts_timeout: fc
                .voice
                .tts_timeout_ms
                .filter(|ms| *ms > 0)
                .map_or(voice_default.tts_timeout, Duration::from_millis),
            wake_word,
        };

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        } else if voice.enabled && !voice.has_endpoints() {
            tracing::info!("voice disabled - stt, assistant and tts endpoints are required");
            voice.enabled = false;
        }

        Self {
            api_server,
            face,
            voice,
        }
    }
}

//! TOML configuration file loading
//!
//! Supports `~/.config/rigo/avatar/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AvatarConfigFile {
    /// Control surface server
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Face animation
    #[serde(default)]
    pub face: FaceFileConfig,

    /// Voice turn pipeline
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Wake word detector
    #[serde(default)]
    pub wake_word: WakeWordFileConfig,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Address to bind (e.g. "0.0.0.0")
    pub bind: Option<String>,

    /// Port for the control surface
    pub port: Option<u16>,
}

/// Face animation configuration
#[derive(Debug, Default, Deserialize)]
pub struct FaceFileConfig {
    /// Device name shown in the caption
    pub name: Option<String>,
    pub tick_ms: Option<u64>,
    pub blink_fast_ms: Option<u64>,
    pub blink_slow_ms: Option<u64>,
    /// Cycle through expressions on this period (unset = off)
    pub demo_cycle_ms: Option<u64>,
}

/// Voice pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable the voice pipeline
    pub enabled: Option<bool>,

    /// Speech-to-text endpoint
    pub stt_url: Option<String>,

    /// Assistant endpoint
    pub assistant_url: Option<String>,

    /// Text-to-speech endpoint
    pub tts_url: Option<String>,

    /// Bearer token sent to all three endpoints
    pub bearer_token: Option<String>,

    /// Length of the capture window after the wake word
    pub capture_ms: Option<u64>,

    pub mic_gain: Option<f32>,
    pub speaker_gain: Option<f32>,
    pub stt_timeout_ms: Option<u64>,
    pub assistant_timeout_ms: Option<u64>,
    pub tts_timeout_ms: Option<u64>,
}

/// Wake word detector configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeWordFileConfig {
    /// Detector implementation (e.g. "energy")
    pub detector: Option<String>,

    /// RMS level (0..1) a frame must exceed to count as active
    pub threshold: Option<f32>,

    /// Sustained activity needed to trigger
    pub trigger_ms: Option<u64>,

    /// Samples per detector frame
    pub frame_len: Option<usize>,
}

/// Load the TOML config file
///
/// An explicit `path` must exist and parse. Without one, the standard path
/// is tried and `AvatarConfigFile::default()` is returned if it is missing or
/// broken.
///
/// # Errors
///
/// Returns error if an explicit path cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<AvatarConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(AvatarConfigFile::default());
    };

    if !path.exists() {
        return Ok(AvatarConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(AvatarConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(AvatarConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/rigo/avatar/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("rigo")
            .join("avatar")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let fc: AvatarConfigFile = toml::from_str(
            r#"
            [voice]
            stt_url = "http://10.0.0.2/stt"
            capture_ms = 5000

            [wake_word]
            threshold = 0.05
            "#,
        )
        .unwrap();

        assert_eq!(fc.voice.stt_url.as_deref(), Some("http://10.0.0.2/stt"));
        assert_eq!(fc.voice.capture_ms, Some(5000));
        assert_eq!(fc.wake_word.threshold, Some(0.05));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config_file(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let fc = load_config_file(Some(&path)).unwrap();
        assert_eq!(fc.server.port, Some(9000));
    }

    #[test]
    fn explicit_path_with_bad_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        assert!(load_config_file(Some(&path)).is_err());
    }
}

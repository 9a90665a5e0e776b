//! Remote speech services
//!
//! Three blocking HTTP calls make up the cloud half of a voice turn:
//! transcription of the captured container, an assistant reply for the
//! transcript, and synthesis of that reply back into a container.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};

use crate::config::VoiceConfig;
use crate::{Error, Result};

/// The remote half of a voice turn
pub trait VoiceCloud {
    /// Transcribe a PCM16 container; an empty string means nothing was heard
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    fn transcribe(&self, container: &[u8]) -> Result<String>;

    /// Ask the assistant; an empty string means no reply
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    fn ask(&self, transcript: &str) -> Result<String>;

    /// Synthesize speech, returning a PCM16 container
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// First non-blank string among `fields` of a JSON object
#[must_use]
pub fn extract_text(value: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Endpoint and deadline for one remote call
#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    timeout: Duration,
}

/// [`VoiceCloud`] over plain HTTP
pub struct HttpCloud {
    client: Client,
    stt: Endpoint,
    assistant: Endpoint,
    tts: Endpoint,
    bearer_token: Option<String>,
}

impl HttpCloud {
    /// Create a client for the configured endpoints
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint is missing or the client cannot be built
    pub fn from_config(config: &VoiceConfig) -> Result<Self> {
        let endpoint = |url: &Option<String>, name: &str, timeout: Duration| {
            url.clone()
                .filter(|u| !u.trim().is_empty())
                .map(|url| Endpoint { url, timeout })
                .ok_or_else(|| Error::Config(format!("{name} endpoint not configured")))
        };

        Ok(Self {
            client: Client::builder().build()?,
            stt: endpoint(&config.stt_url, "stt", config.stt_timeout)?,
            assistant: endpoint(
                &config.assistant_url,
                "assistant",
                config.assistant_timeout,
            )?,
            tts: endpoint(&config.tts_url, "tts", config.tts_timeout)?,
            bearer_token: config.bearer_token.clone(),
        })
    }

    fn post(&self, endpoint: &Endpoint) -> RequestBuilder {
        let request = self.client.post(&endpoint.url).timeout(endpoint.timeout);
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn check_status(
    response: reqwest::blocking::Response,
    wrap: fn(String) -> Error,
) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    tracing::error!(status = %status, body = %body, "remote call failed");
    Err(wrap(format!("{status}: {body}")))
}

impl VoiceCloud for HttpCloud {
    fn transcribe(&self, container: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = container.len(), "starting transcription");

        let response = self
            .post(&self.stt)
            .header(CONTENT_TYPE, "audio/wav")
            .body(container.to_vec())
            .send()?;
        let body: Value = check_status(response, Error::Stt)?.json()?;

        let transcript = extract_text(&body, &["text", "transcript"]).unwrap_or_default();
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    fn ask(&self, transcript: &str) -> Result<String> {
        let response = self
            .post(&self.assistant)
            .json(&json!({ "text": transcript }))
            .send()?;
        let body: Value = check_status(response, Error::Assistant)?.json()?;

        let reply = extract_text(&body, &["reply", "text"]).unwrap_or_default();
        tracing::info!(reply = %reply, "assistant replied");
        Ok(reply)
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.chars().count(), "starting synthesis");

        let response = self.post(&self.tts).json(&json!({ "text": text })).send()?;
        let audio = check_status(response, Error::Tts)?.bytes()?;

        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}

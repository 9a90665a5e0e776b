//! Rigo avatar - an animated face with a voice assistant
//!
//! This library provides the core functionality for the avatar:
//! - Expressive state shared by every producer and consumer
//! - Face animation (expressions, talking mouth, blinks)
//! - HTTP control surface
//! - Voice turn pipeline (wake word, STT, assistant, TTS)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐
//! │  Control surface │    │  Voice pipeline  │
//! │   (axum, HTTP)   │    │ (voice-turn thr) │
//! └────────┬─────────┘    └────────┬─────────┘
//!          │ StateUpdate           │ StateUpdate
//! ┌────────▼───────────────────────▼─────────┐
//! │          Expressive state actor          │
//! └────────────────────┬─────────────────────┘
//!                      │ snapshot (watch)
//! ┌────────────────────▼─────────────────────┐
//! │   Animation driver ─► RenderSurface      │
//! └──────────────────────────────────────────┘
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod face;
pub mod state;
pub mod voice;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use face::{Animator, ExpressionKind, FaceFrame, RenderSurface};
pub use state::{StateHandle, StateUpdate, StateView};

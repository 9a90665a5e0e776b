//! Daemon - the main avatar service
//!
//! Orchestrates the expressive state actor, the animation driver, the
//! control surface and the voice pipeline thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::api::ApiServer;
use crate::clock::MonotonicClock;
use crate::face::{Animator, RenderSurface, TracingSurface, driver};
use crate::{Config, Result, state, voice};

/// The Rigo daemon - owns every long-running task
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run with the headless surface until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the daemon encounters a fatal error
    pub async fn run(self) -> Result<()> {
        self.run_with_surface(TracingSurface).await
    }

    /// Run until interrupted, drawing frames on `surface`
    ///
    /// # Errors
    ///
    /// Returns error if the control surface cannot bind or fails
    pub async fn run_with_surface<S: RenderSurface + 'static>(self, surface: S) -> Result<()> {
        let config = self.config;
        tracing::info!(
            name = %config.face.name,
            port = config.api_server.port,
            voice = config.voice.enabled,
            "daemon running"
        );

        let state = state::spawn(Arc::new(MonotonicClock::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let voice_stop = Arc::new(AtomicBool::new(false));

        let animation = tokio::spawn(driver::run(
            Animator::new(config.face.name.clone()),
            state.clone(),
            surface,
            config.face.clone(),
            shutdown_rx.clone(),
        ));

        if let Some(period) = config.face.demo_cycle {
            tracing::info!(?period, "expression demo cycle enabled");
            tokio::spawn(driver::cycle_expressions(
                state.clone(),
                period,
                shutdown_rx.clone(),
            ));
        }

        let mut api = ApiServer::new(state.clone(), &config.api_server).spawn(shutdown_rx.clone());

        let voice = if config.voice.enabled {
            Some(voice::spawn(
                config.voice.clone(),
                state.clone(),
                Arc::clone(&voice_stop),
            )?)
        } else {
            tracing::info!("voice disabled - running face and control surface only");
            None
        };

        tracing::info!("avatar ready");

        let server_result = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                }
                tracing::info!("shutdown requested");
                None
            }
            joined = &mut api => Some(joined),
        };

        let _ = shutdown_tx.send(true);
        voice_stop.store(true, Ordering::Relaxed);

        if let Ok(animator) = animation.await {
            tracing::debug!(expression = %animator.pose().expression, "animation stopped");
        }

        let server_result = match server_result {
            Some(joined) => joined,
            None => api.await,
        };

        // The voice thread exits at its next listening frame; a turn in
        // flight is bounded by the remote timeouts, so it is not joined here.
        if let Some(handle) = voice {
            tracing::debug!(finished = handle.is_finished(), "voice thread signalled");
        }

        tracing::info!("daemon stopped");

        match server_result {
            Ok(result) => result,
            Err(e) => Err(crate::Error::Config(format!("API server task failed: {e}"))),
        }
    }
}

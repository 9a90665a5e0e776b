//! Animation scheduling
//!
//! One task multiplexes three repeating timers: the main tick that follows
//! the expressive state, and two blink timers that both toggle the eyelids.
//! The two blink periods interleave, so the resulting blink pattern is
//! irregular rather than strictly periodic.

use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use super::{Animator, FaceFrame, RenderSurface};
use crate::config::FaceConfig;
use crate::state::StateHandle;

fn repeating(period: std::time::Duration, immediate: bool) -> Interval {
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut timer = interval_at(start, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

fn emit<S: RenderSurface>(surface: &mut S, frame: &FaceFrame) {
    if let Err(e) = surface.apply(frame) {
        tracing::warn!(error = %e, "render surface rejected frame");
    }
}

/// Run the animation loop until `shutdown` changes or its sender is dropped
///
/// Returns the animator so callers can inspect the final pose.
pub async fn run<S: RenderSurface>(
    mut animator: Animator,
    state: StateHandle,
    mut surface: S,
    config: FaceConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Animator {
    let mut tick = repeating(config.tick, true);
    let mut blink_fast = repeating(config.blink_fast, false);
    let mut blink_slow = repeating(config.blink_slow, false);

    tracing::debug!(
        tick = ?config.tick,
        blink_fast = ?config.blink_fast,
        blink_slow = ?config.blink_slow,
        "animation driver started"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Some(frame) = animator.tick(state.read()) {
                    emit(&mut surface, &frame);
                }
            }
            _ = blink_fast.tick() => {
                let frame = animator.toggle_blink();
                emit(&mut surface, &frame);
            }
            _ = blink_slow.tick() => {
                let frame = animator.toggle_blink();
                emit(&mut surface, &frame);
            }
        }
    }

    tracing::debug!("animation driver stopped");
    animator
}

/// Step through every expression on a fixed period
///
/// Attract mode for an idle device; writes go through the state actor like
/// any other producer.
pub async fn cycle_expressions(
    state: StateHandle,
    period: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = repeating(period, false);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = timer.tick() => {
                let next = state.read().expression.next();
                if let Err(e) = state.set_expression(next).await {
                    tracing::warn!(error = %e, "expression cycle stopped");
                    break;
                }
            }
        }
    }
}

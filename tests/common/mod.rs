//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;

use rigo_avatar::{ManualClock, StateHandle, state};

/// Start a state actor driven by a hand-advanced clock
///
/// Must be called inside a tokio runtime.
#[must_use]
pub fn manual_state() -> (StateHandle, ManualClock) {
    let clock = ManualClock::new();
    let handle = state::spawn(Arc::new(clock.clone()));
    (handle, clock)
}

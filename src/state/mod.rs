//! Shared expressive state
//!
//! The expressive state is the only datum shared between the animation
//! driver, the control surface and the voice pipeline. A single actor task
//! owns the record:
//!
//! ```text
//!  control surface ──┐                      ┌──► animation driver
//!                    ├─ mpsc ─► actor ─ watch┤
//!  voice pipeline ───┘   (ack)              └──► GET /state
//! ```
//!
//! Writers send a [`StateUpdate`] and wait for the acknowledgement, so a
//! writer always observes its own update on the next read. Readers never
//! message the actor; they borrow the last whole-record snapshot published
//! on the watch channel, which rules out torn reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::clock::Clock;
use crate::face::ExpressionKind;
use crate::{Error, Result};

/// Slowest talk animation speed
pub const MIN_TALK_SPEED: u8 = 1;

/// Fastest talk animation speed
pub const MAX_TALK_SPEED: u8 = 12;

/// Talk speed at startup
pub const DEFAULT_TALK_SPEED: u8 = 6;

/// Pending updates the actor will queue before writers wait
const COMMAND_CAPACITY: usize = 32;

/// The authoritative expressive record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressiveState {
    /// Last commanded mood
    pub desired_expression: ExpressionKind,
    /// Explicit "talk continuously" flag
    pub desired_talking: bool,
    /// Monotonic instant (µs) until which the face keeps talking
    pub talk_hold_until_us: u64,
    /// Animation rate hint, always within `[MIN_TALK_SPEED, MAX_TALK_SPEED]`
    pub talk_speed: u8,
}

impl Default for ExpressiveState {
    fn default() -> Self {
        Self {
            desired_expression: ExpressionKind::Happy,
            desired_talking: false,
            talk_hold_until_us: 0,
            talk_speed: DEFAULT_TALK_SPEED,
        }
    }
}

impl ExpressiveState {
    /// Explicit flag OR a hold that has not expired yet
    #[must_use]
    pub const fn is_talking(&self, now_us: u64) -> bool {
        self.desired_talking || now_us < self.talk_hold_until_us
    }

    /// Derived view at `now_us`
    #[must_use]
    pub const fn view(&self, now_us: u64) -> StateView {
        StateView {
            expression: self.desired_expression,
            is_talking: self.is_talking(now_us),
        }
    }

    fn apply(&mut self, update: StateUpdate, now_us: u64) {
        match update {
            StateUpdate::Expression(kind) => self.desired_expression = kind,
            StateUpdate::Talking { on, hold } => self.talk(on, hold, now_us),
            StateUpdate::Speed(speed) => self.talk_speed = clamp_speed(speed),
            StateUpdate::Mood {
                expression,
                talking,
            } => {
                self.desired_expression = expression;
                self.desired_talking = talking;
            }
            StateUpdate::Perform {
                expression,
                on,
                hold,
                speed,
            } => {
                if let Some(kind) = expression {
                    self.desired_expression = kind;
                }
                self.talk(on, hold, now_us);
                if let Some(speed) = speed {
                    self.talk_speed = clamp_speed(speed);
                }
            }
        }
    }

    fn talk(&mut self, on: Option<bool>, hold: Option<Duration>, now_us: u64) {
        if let Some(on) = on {
            self.desired_talking = on;
        }
        if let Some(hold) = hold.filter(|h| !h.is_zero()) {
            #[allow(clippy::cast_possible_truncation)]
            let hold_us = hold.as_micros() as u64;
            self.talk_hold_until_us = now_us.saturating_add(hold_us);
        }
    }
}

/// What readers see: the mood and whether the face is talking right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateView {
    pub expression: ExpressionKind,
    pub is_talking: bool,
}

/// A single atomic write to the expressive state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    /// Overwrite the desired expression
    Expression(ExpressionKind),
    /// Set the talking flag (when given) and/or extend the hold (when non-zero)
    Talking {
        on: Option<bool>,
        hold: Option<Duration>,
    },
    /// Set the talk speed, clamped into range
    Speed(i64),
    /// Set expression and talking flag together
    Mood {
        expression: ExpressionKind,
        talking: bool,
    },
    /// Any mix of expression, talking flag, hold and speed in one write
    Perform {
        expression: Option<ExpressionKind>,
        on: Option<bool>,
        hold: Option<Duration>,
        speed: Option<i64>,
    },
}

/// Clamp a requested talk speed into `[MIN_TALK_SPEED, MAX_TALK_SPEED]`
#[must_use]
pub fn clamp_speed(speed: i64) -> u8 {
    let clamped = speed.clamp(i64::from(MIN_TALK_SPEED), i64::from(MAX_TALK_SPEED));
    u8::try_from(clamped).unwrap_or(DEFAULT_TALK_SPEED)
}

struct Command {
    update: StateUpdate,
    ack: oneshot::Sender<()>,
}

/// Cloneable access to the expressive state actor
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ExpressiveState>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

/// Start the state actor on the current tokio runtime
#[must_use]
pub fn spawn(clock: Arc<dyn Clock>) -> StateHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshot_tx, snapshot_rx) = watch::channel(ExpressiveState::default());

    tokio::spawn(run_actor(rx, snapshot_tx, Arc::clone(&clock)));

    StateHandle {
        tx,
        snapshot: snapshot_rx,
        clock,
    }
}

async fn run_actor(
    mut rx: mpsc::Receiver<Command>,
    snapshot: watch::Sender<ExpressiveState>,
    clock: Arc<dyn Clock>,
) {
    let mut state = *snapshot.borrow();
    tracing::debug!(?state, "expressive state actor started");

    while let Some(Command { update, ack }) = rx.recv().await {
        state.apply(update, clock.now_us());
        snapshot.send_replace(state);
        tracing::trace!(?update, ?state, "expressive state updated");
        let _ = ack.send(());
    }

    tracing::debug!("expressive state actor stopped");
}

fn actor_gone() -> Error {
    Error::State("expressive state actor stopped".to_string())
}

impl StateHandle {
    /// Apply an update and wait until it is visible to readers
    ///
    /// # Errors
    ///
    /// Returns error if the actor has stopped
    pub async fn apply(&self, update: StateUpdate) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command { update, ack })
            .await
            .map_err(|_| actor_gone())?;
        done.await.map_err(|_| actor_gone())
    }

    /// Blocking variant of [`Self::apply`] for threads outside the runtime
    ///
    /// Must not be called from an async context.
    ///
    /// # Errors
    ///
    /// Returns error if the actor has stopped
    pub fn apply_blocking(&self, update: StateUpdate) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .blocking_send(Command { update, ack })
            .map_err(|_| actor_gone())?;
        done.blocking_recv().map_err(|_| actor_gone())
    }

    /// Overwrite the desired expression
    ///
    /// # Errors
    ///
    /// Returns error if the actor has stopped
    pub async fn set_expression(&self, kind: ExpressionKind) -> Result<()> {
        self.apply(StateUpdate::Expression(kind)).await
    }

    /// Set the talking flag and/or a talk hold
    ///
    /// # Errors
    ///
    /// Returns error if the actor has stopped
    pub async fn set_talking(&self, on: Option<bool>, hold: Option<Duration>) -> Result<()> {
        self.apply(StateUpdate::Talking { on, hold }).await
    }

    /// Set the talk speed hint
    ///
    /// # Errors
    ///
    /// Returns error if the actor has stopped
    pub async fn set_speed(&self, speed: i64) -> Result<()> {
        self.apply(StateUpdate::Speed(speed)).await
    }

    /// Watch every record the actor publishes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExpressiveState> {
        self.snapshot.clone()
    }

    /// Current expression and talking status
    #[must_use]
    pub fn read(&self) -> StateView {
        self.snapshot().view(self.clock.now_us())
    }

    /// Last published record
    #[must_use]
    pub fn snapshot(&self) -> ExpressiveState {
        *self.snapshot.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn setup() -> (StateHandle, ManualClock) {
        let clock = ManualClock::new();
        let handle = spawn(Arc::new(clock.clone()));
        (handle, clock)
    }

    #[tokio::test]
    async fn starts_happy_and_quiet() {
        let (state, _) = setup();
        let view = state.read();
        assert_eq!(view.expression, ExpressionKind::Happy);
        assert!(!view.is_talking);
        assert_eq!(state.snapshot().talk_speed, DEFAULT_TALK_SPEED);
    }

    #[tokio::test]
    async fn set_expression_is_visible_to_next_read() {
        let (state, _) = setup();
        for kind in ExpressionKind::ALL {
            state.set_expression(kind).await.unwrap();
            assert_eq!(state.read().expression, kind);
        }
    }

    #[tokio::test]
    async fn hold_keeps_talking_until_expiry() {
        let (state, clock) = setup();

        state
            .set_talking(Some(false), Some(Duration::from_millis(500)))
            .await
            .unwrap();
        assert!(state.read().is_talking);

        clock.advance(Duration::from_millis(499));
        assert!(state.read().is_talking);

        clock.advance(Duration::from_millis(1));
        assert!(!state.read().is_talking);
    }

    #[tokio::test]
    async fn explicit_flag_talks_indefinitely() {
        let (state, clock) = setup();

        state.set_talking(Some(true), None).await.unwrap();
        clock.advance(Duration::from_secs(3600));
        assert!(state.read().is_talking);

        state.set_talking(Some(false), None).await.unwrap();
        assert!(!state.read().is_talking);
    }

    #[tokio::test]
    async fn hold_without_flag_leaves_flag_untouched() {
        let (state, _) = setup();

        state.set_talking(Some(true), None).await.unwrap();
        state
            .set_talking(None, Some(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(state.snapshot().desired_talking);
    }

    #[tokio::test]
    async fn zero_hold_is_ignored() {
        let (state, _) = setup();
        state.set_talking(None, Some(Duration::ZERO)).await.unwrap();
        assert_eq!(state.snapshot().talk_hold_until_us, 0);
        assert!(!state.read().is_talking);
    }

    #[tokio::test]
    async fn mood_update_sets_both_fields() {
        let (state, _) = setup();
        state
            .apply(StateUpdate::Mood {
                expression: ExpressionKind::Puzzled,
                talking: true,
            })
            .await
            .unwrap();

        let view = state.read();
        assert_eq!(view.expression, ExpressionKind::Puzzled);
        assert!(view.is_talking);
    }

    #[tokio::test]
    async fn set_speed_stores_clamped_value() {
        let (state, _) = setup();
        state.set_speed(40).await.unwrap();
        assert_eq!(state.snapshot().talk_speed, MAX_TALK_SPEED);
        state.set_speed(3).await.unwrap();
        assert_eq!(state.snapshot().talk_speed, 3);
    }

    #[tokio::test]
    async fn perform_applies_every_field_at_once() {
        let (state, clock) = setup();

        state
            .apply(StateUpdate::Perform {
                expression: Some(ExpressionKind::Sad),
                on: Some(true),
                hold: Some(Duration::from_millis(200)),
                speed: Some(0),
            })
            .await
            .unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.desired_expression, ExpressionKind::Sad);
        assert!(snapshot.desired_talking);
        assert_eq!(snapshot.talk_hold_until_us, clock.now_us() + 200_000);
        assert_eq!(snapshot.talk_speed, MIN_TALK_SPEED);
    }

    #[tokio::test]
    async fn perform_leaves_absent_fields_alone() {
        let (state, _) = setup();
        state.set_talking(Some(true), None).await.unwrap();

        state
            .apply(StateUpdate::Perform {
                expression: None,
                on: None,
                hold: None,
                speed: Some(9),
            })
            .await
            .unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.desired_expression, ExpressionKind::Happy);
        assert!(snapshot.desired_talking);
        assert_eq!(snapshot.talk_speed, 9);
    }

    #[tokio::test]
    async fn perform_publishes_a_single_record() {
        let (state, _) = setup();
        let mut rx = state.subscribe();

        let seen = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let record = *rx.borrow_and_update();
                seen.push(record);
                if record.desired_talking {
                    break;
                }
            }
            seen
        });

        state
            .apply(StateUpdate::Perform {
                expression: Some(ExpressionKind::Angry),
                on: Some(true),
                hold: None,
                speed: None,
            })
            .await
            .unwrap();

        let seen = seen.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].desired_expression, ExpressionKind::Angry);
        assert!(seen[0].desired_talking);
    }

    #[test]
    fn speed_is_clamped() {
        assert_eq!(clamp_speed(0), MIN_TALK_SPEED);
        assert_eq!(clamp_speed(-40), MIN_TALK_SPEED);
        assert_eq!(clamp_speed(7), 7);
        assert_eq!(clamp_speed(99), MAX_TALK_SPEED);
    }

    #[tokio::test]
    async fn blocking_writes_work_off_the_runtime() {
        let (state, _) = setup();
        let writer = state.clone();

        tokio::task::spawn_blocking(move || {
            writer
                .apply_blocking(StateUpdate::Expression(ExpressionKind::Angry))
                .unwrap();
        })
        .await
        .unwrap();

        assert_eq!(state.read().expression, ExpressionKind::Angry);
    }
}

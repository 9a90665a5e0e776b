//! Face animation integration tests
//!
//! The driver runs on tokio's paused clock, so timer cadence is exact and
//! the tests finish instantly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rigo_avatar::config::FaceConfig;
use rigo_avatar::face::pose::{self, TALK_FRAMES};
use rigo_avatar::face::{Animator, FaceFrame, RenderSurface, driver};
use rigo_avatar::{ExpressionKind, Result, StateHandle};
use tokio::sync::watch;

mod common;
use common::manual_state;

/// Surface that keeps every frame it is given
#[derive(Clone, Default)]
struct RecordingSurface {
    frames: Arc<Mutex<Vec<FaceFrame>>>,
}

impl RenderSurface for RecordingSurface {
    fn apply(&mut self, frame: &FaceFrame) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

/// Run the driver for `window` of virtual time and return the frames
async fn drive(state: &StateHandle, window: Duration) -> (Vec<FaceFrame>, Animator) {
    let surface = RecordingSurface::default();
    let frames = Arc::clone(&surface.frames);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(driver::run(
        Animator::new("rigo"),
        state.clone(),
        surface,
        FaceConfig::default(),
        shutdown_rx,
    ));

    tokio::time::sleep(window).await;
    shutdown_tx.send(true).unwrap();
    let animator = task.await.unwrap();

    let frames = frames.lock().unwrap().clone();
    (frames, animator)
}

fn mouths(frames: &[FaceFrame]) -> Vec<rigo_avatar::face::MouthArc> {
    frames
        .iter()
        .filter_map(|f| match f {
            FaceFrame::Mouth(arc) => Some(*arc),
            _ => None,
        })
        .collect()
}

fn blinks(frames: &[FaceFrame]) -> Vec<bool> {
    frames
        .iter()
        .filter_map(|f| match f {
            FaceFrame::Eyes(eyes) => Some(eyes.open),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_draws_startup_expression() {
    let (state, _) = manual_state();

    let (frames, animator) = drive(&state, Duration::from_millis(50)).await;

    let FaceFrame::Expression(pose) = &frames[0] else {
        panic!("expected expression frame, got {:?}", frames[0]);
    };
    assert_eq!(pose.expression, ExpressionKind::Happy);
    assert_eq!(pose.caption, "rigo: happy");
    assert_eq!(animator.pose().expression, ExpressionKind::Happy);
}

#[tokio::test(start_paused = true)]
async fn test_idle_face_only_blinks() {
    let (state, _) = manual_state();

    // Ticks at 0, 130, 260, 390; fast blink at 220
    let (frames, _) = drive(&state, Duration::from_millis(400)).await;

    assert_eq!(frames.len(), 2);
    assert!(mouths(&frames).is_empty());
    assert_eq!(blinks(&frames), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn test_talking_cycles_mouth_phases() {
    let (state, _) = manual_state();
    state.set_talking(Some(true), None).await.unwrap();

    // Ticks at 0 (expression), 130, 260, 390, 520
    let (frames, animator) = drive(&state, Duration::from_millis(600)).await;

    assert_eq!(
        mouths(&frames),
        vec![TALK_FRAMES[1], TALK_FRAMES[2], TALK_FRAMES[3], TALK_FRAMES[0]]
    );
    assert_eq!(animator.mouth_phase(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_blink_timers_interleave() {
    let (state, _) = manual_state();

    // Fast blink every 220 ms plus slow blink at 2800 ms, all toggling
    let (frames, animator) = drive(&state, Duration::from_millis(2900)).await;

    let blinks = blinks(&frames);
    // 2900 / 220 = 13 fast toggles, plus one slow toggle
    assert_eq!(blinks.len(), 14);
    assert!(blinks.windows(2).all(|w| w[0] != w[1]));
    assert_eq!(animator.blink_open(), *blinks.last().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_expression_change_redraws_static_pose() {
    let (state, _) = manual_state();
    state.set_talking(Some(true), None).await.unwrap();

    let surface = RecordingSurface::default();
    let frames = Arc::clone(&surface.frames);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(driver::run(
        Animator::new("rigo"),
        state.clone(),
        surface,
        FaceConfig::default(),
        shutdown_rx,
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    state.set_expression(ExpressionKind::Angry).await.unwrap();
    state.set_talking(Some(false), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();

    let frames = frames.lock().unwrap().clone();
    let expressions: Vec<_> = frames
        .iter()
        .filter_map(|f| match f {
            FaceFrame::Expression(pose) => Some((pose.expression, pose.mouth)),
            _ => None,
        })
        .collect();

    // Tick at 260 redraws the whole angry pose, including its resting mouth
    assert_eq!(
        expressions,
        vec![
            (ExpressionKind::Happy, pose::shape(ExpressionKind::Happy).mouth),
            (ExpressionKind::Angry, pose::shape(ExpressionKind::Angry).mouth),
        ]
    );
    assert_eq!(mouths(&frames), vec![TALK_FRAMES[1]]);
}

#[tokio::test(start_paused = true)]
async fn test_mouth_rests_once_when_talking_stops() {
    let (state, clock) = manual_state();
    state
        .set_talking(None, Some(Duration::from_millis(250)))
        .await
        .unwrap();

    let surface = RecordingSurface::default();
    let frames = Arc::clone(&surface.frames);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(driver::run(
        Animator::new("rigo"),
        state.clone(),
        surface,
        FaceConfig::default(),
        shutdown_rx,
    ));

    // Ticks at 0 (expression) and 130 (talking)
    tokio::time::sleep(Duration::from_millis(200)).await;
    clock.advance(Duration::from_millis(250));
    // Ticks at 260 (falling edge), 390 and 520 (idle)
    tokio::time::sleep(Duration::from_millis(400)).await;

    shutdown_tx.send(true).unwrap();
    let animator = task.await.unwrap();

    let frames = frames.lock().unwrap().clone();
    assert_eq!(
        mouths(&frames),
        vec![TALK_FRAMES[1], pose::shape(ExpressionKind::Happy).mouth]
    );
    assert_eq!(animator.mouth_phase(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_demo_cycle_walks_expressions() {
    let (state, _) = manual_state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(driver::cycle_expressions(
        state.clone(),
        Duration::from_secs(5),
        shutdown_rx,
    ));

    tokio::time::sleep(Duration::from_millis(5100)).await;
    assert_eq!(state.read().expression, ExpressionKind::Happy.next());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(state.read().expression, ExpressionKind::Happy.next().next());

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}

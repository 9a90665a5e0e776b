//! Pose derivation from expressive state
//!
//! The animator is pure: it turns a sequence of state reads and blink
//! toggles into frames for the render surface. Timing lives in the driver.

use serde::Serialize;

use super::pose::{self, EyePose, MouthArc, RenderPose, TALK_FRAMES};
use super::ExpressionKind;
use crate::state::StateView;

/// Number of mouth frames in the talk cycle
pub const MOUTH_PHASES: u8 = 4;

/// One update for the render surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FaceFrame {
    /// Redraw brows, mouth and caption for a new expression
    Expression(RenderPose),
    /// Move only the mouth
    Mouth(MouthArc),
    /// Open or close both eyes
    Eyes(EyePose),
}

/// Derives face frames from the expressive state
#[derive(Debug, Clone)]
pub struct Animator {
    name: String,
    last_expression: Option<ExpressionKind>,
    was_talking: bool,
    mouth_phase: u8,
    blink_open: bool,
    pose: RenderPose,
}

impl Animator {
    /// Create an animator whose captions carry `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let pose = RenderPose::for_expression(ExpressionKind::Happy, EyePose::open(), &name);
        Self {
            name,
            last_expression: None,
            was_talking: false,
            mouth_phase: 0,
            blink_open: true,
            pose,
        }
    }

    /// Advance one main tick
    ///
    /// A changed expression always wins over the talk cycle and is drawn
    /// from the static table, never derived from the previous frame.
    pub fn tick(&mut self, view: StateView) -> Option<FaceFrame> {
        if self.last_expression != Some(view.expression) {
            self.last_expression = Some(view.expression);
            self.was_talking = view.is_talking;
            self.pose = RenderPose::for_expression(view.expression, self.pose.eyes, &self.name);
            return Some(FaceFrame::Expression(self.pose.clone()));
        }

        if view.is_talking {
            self.was_talking = true;
            self.mouth_phase = (self.mouth_phase + 1) % MOUTH_PHASES;
            let arc = TALK_FRAMES[usize::from(self.mouth_phase)];
            self.pose.mouth = arc;
            return Some(FaceFrame::Mouth(arc));
        }

        if self.was_talking {
            // Close the mouth once when talking stops
            self.was_talking = false;
            self.mouth_phase = 0;
            let arc = pose::shape(view.expression).mouth;
            self.pose.mouth = arc;
            return Some(FaceFrame::Mouth(arc));
        }

        None
    }

    /// Flip the eyelids
    pub fn toggle_blink(&mut self) -> FaceFrame {
        self.blink_open = !self.blink_open;
        let eyes = EyePose::with_open(self.blink_open);
        self.pose.eyes = eyes;
        FaceFrame::Eyes(eyes)
    }

    /// Everything currently drawn
    #[must_use]
    pub const fn pose(&self) -> &RenderPose {
        &self.pose
    }

    #[must_use]
    pub const fn mouth_phase(&self) -> u8 {
        self.mouth_phase
    }

    #[must_use]
    pub const fn blink_open(&self) -> bool {
        self.blink_open
    }
}

//! Animated face
//!
//! Turns the expressive state into frames for the display: a static pose per
//! expression, a four-frame mouth cycle while talking, and eyelid blinks.

mod animator;
pub mod driver;
mod expression;
pub mod pose;
mod surface;

pub use animator::{Animator, FaceFrame, MOUTH_PHASES};
pub use expression::ExpressionKind;
pub use pose::{EyePose, MouthArc, RenderPose};
pub use surface::{RenderSurface, TracingSurface};

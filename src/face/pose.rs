//! Face geometry: static expression table, talk frames and eyelids

use serde::Serialize;

use super::ExpressionKind;

/// Left brow runs outer -> inner
const BROW_LEFT_OUTER_X: i32 = 95;
const BROW_LEFT_INNER_X: i32 = 145;

/// Right brow runs inner -> outer
const BROW_RIGHT_INNER_X: i32 = 175;
const BROW_RIGHT_OUTER_X: i32 = 225;

/// Horizontal position of the mouth arc
const MOUTH_X: i32 = 110;

/// Eye geometry
pub const EYE_SIZE: i32 = 44;
pub const EYE_Y: i32 = 95;
const EYE_LEFT_X: i32 = 85;
const EYE_RIGHT_X: i32 = 190;
const PUPIL_SIZE: i32 = 14;

/// Height of a closed eye
const EYE_CLOSED_HEIGHT: i32 = 5;

/// A closed eye sits lower, near the middle of the open eye
const EYE_CLOSED_DROP: i32 = 10;

/// A 2-D point in display coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A brow drawn as one straight segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrowLine {
    pub start: Point,
    pub end: Point,
}

/// Mouth arc: background angles in degrees plus position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MouthArc {
    pub start_deg: u16,
    pub end_deg: u16,
    pub x: i32,
    pub y: i32,
}

impl MouthArc {
    const fn new(start_deg: u16, end_deg: u16, y: i32) -> Self {
        Self {
            start_deg,
            end_deg,
            x: MOUTH_X,
            y,
        }
    }
}

/// Eyelid state applied to both eyes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EyePose {
    pub open: bool,
    pub left_x: i32,
    pub right_x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub pupil_size: i32,
    pub pupil_visible: bool,
}

impl EyePose {
    #[must_use]
    pub const fn open() -> Self {
        Self {
            open: true,
            left_x: EYE_LEFT_X,
            right_x: EYE_RIGHT_X,
            y: EYE_Y,
            width: EYE_SIZE,
            height: EYE_SIZE,
            pupil_size: PUPIL_SIZE,
            pupil_visible: true,
        }
    }

    #[must_use]
    pub const fn closed() -> Self {
        Self {
            open: false,
            left_x: EYE_LEFT_X,
            right_x: EYE_RIGHT_X,
            y: EYE_Y + EYE_CLOSED_DROP,
            width: EYE_SIZE,
            height: EYE_CLOSED_HEIGHT,
            pupil_size: PUPIL_SIZE,
            pupil_visible: false,
        }
    }

    #[must_use]
    pub const fn with_open(open: bool) -> Self {
        if open { Self::open() } else { Self::closed() }
    }
}

/// Brow heights and mouth for one expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressionShape {
    pub left_in: i32,
    pub left_out: i32,
    pub right_in: i32,
    pub right_out: i32,
    pub mouth: MouthArc,
}

impl ExpressionShape {
    /// Brow segments for this shape, left then right
    #[must_use]
    pub const fn brows(&self) -> [BrowLine; 2] {
        [
            BrowLine {
                start: Point {
                    x: BROW_LEFT_OUTER_X,
                    y: self.left_out,
                },
                end: Point {
                    x: BROW_LEFT_INNER_X,
                    y: self.left_in,
                },
            },
            BrowLine {
                start: Point {
                    x: BROW_RIGHT_INNER_X,
                    y: self.right_in,
                },
                end: Point {
                    x: BROW_RIGHT_OUTER_X,
                    y: self.right_out,
                },
            },
        ]
    }
}

/// Static pose table, one entry per expression
#[must_use]
pub const fn shape(kind: ExpressionKind) -> ExpressionShape {
    let (left_in, left_out, right_in, right_out, mouth) = match kind {
        ExpressionKind::Happy => (82, 78, 82, 78, MouthArc::new(25, 155, 145)),
        ExpressionKind::Sad => (78, 82, 78, 82, MouthArc::new(205, 335, 165)),
        ExpressionKind::Puzzled => (75, 90, 85, 72, MouthArc::new(350, 30, 160)),
        ExpressionKind::Angry => (95, 70, 95, 70, MouthArc::new(350, 20, 165)),
        ExpressionKind::Neutral => (80, 80, 80, 80, MouthArc::new(0, 180, 165)),
    };

    ExpressionShape {
        left_in,
        left_out,
        right_in,
        right_out,
        mouth,
    }
}

/// Mouth frames cycled while talking, indexed by mouth phase
pub const TALK_FRAMES: [MouthArc; 4] = [
    MouthArc::new(0, 180, 165),
    MouthArc::new(20, 160, 150),
    MouthArc::new(30, 150, 145),
    MouthArc::new(20, 160, 150),
];

/// Everything currently drawn on the face
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPose {
    pub expression: ExpressionKind,
    pub brows: [BrowLine; 2],
    pub mouth: MouthArc,
    pub eyes: EyePose,
    pub caption: String,
}

impl RenderPose {
    /// Full static pose for an expression
    #[must_use]
    pub fn for_expression(kind: ExpressionKind, eyes: EyePose, name: &str) -> Self {
        let shape = shape(kind);
        Self {
            expression: kind,
            brows: shape.brows(),
            mouth: shape.mouth,
            eyes,
            caption: format!("{name}: {kind}"),
        }
    }
}

//! Render surface boundary

use super::FaceFrame;
use crate::Result;

/// A drawing surface that accepts face frames
///
/// Implemented by the display backend. Frames are deltas: an expression
/// frame redraws brows, mouth and caption, mouth and eye frames touch only
/// their part.
pub trait RenderSurface: Send {
    /// Apply one frame
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the frame
    fn apply(&mut self, frame: &FaceFrame) -> Result<()>;
}

/// Headless surface that logs every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSurface;

impl RenderSurface for TracingSurface {
    fn apply(&mut self, frame: &FaceFrame) -> Result<()> {
        match frame {
            FaceFrame::Expression(pose) => {
                tracing::info!(
                    expression = %pose.expression,
                    caption = %pose.caption,
                    mouth = ?pose.mouth,
                    "face expression"
                );
            }
            FaceFrame::Mouth(arc) => {
                tracing::trace!(
                    start = arc.start_deg,
                    end = arc.end_deg,
                    x = arc.x,
                    y = arc.y,
                    "mouth"
                );
            }
            FaceFrame::Eyes(eyes) => {
                tracing::trace!(open = eyes.open, y = eyes.y, height = eyes.height, "eyes");
            }
        }
        Ok(())
    }
}

use crate::shared::face_region::FaceRegion;
use crate::shared::frame::RawFrame;

/// Domain interface for face localization.
///
/// Returns every face found in the upright frame as a normalized region.
/// An empty vector is a valid answer. Implementations may keep state
/// between frames, hence `&mut self`.
pub trait FaceLocator: Send {
    fn locate(&mut self, frame: &RawFrame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>>;
}

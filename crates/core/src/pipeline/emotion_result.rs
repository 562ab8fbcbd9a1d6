use crate::classification::domain::emotion::EmotionLabel;
use crate::shared::face_region::FaceRegion;

/// One face and what it was classified as.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceAnalysis {
    pub region: FaceRegion,
    pub label: EmotionLabel,
}

/// The outcome of one processing cycle.
///
/// Built once by the coordinator and shared read-only with the presentation
/// side. Faces keep detector order; the first is the primary face.
#[derive(Clone, Debug, PartialEq)]
pub struct EmotionResult {
    generation: u64,
    sequence: u64,
    faces: Vec<FaceAnalysis>,
}

impl EmotionResult {
    pub fn new(generation: u64, sequence: u64, faces: Vec<FaceAnalysis>) -> Self {
        Self {
            generation,
            sequence,
            faces,
        }
    }

    /// No faces: label `Unknown`, no regions.
    pub fn no_face(generation: u64, sequence: u64) -> Self {
        Self::new(generation, sequence, Vec::new())
    }

    /// Camera generation the source frame was captured in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Capture sequence number of the source frame.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Label of the primary face, or `Unknown` when there is none.
    pub fn label(&self) -> EmotionLabel {
        self.faces
            .first()
            .map(|face| face.label)
            .unwrap_or(EmotionLabel::Unknown)
    }

    pub fn faces(&self) -> &[FaceAnalysis] {
        &self.faces
    }

    pub fn regions(&self) -> Vec<FaceRegion> {
        self.faces.iter().map(|face| face.region).collect()
    }
}

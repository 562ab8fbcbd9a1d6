/// Which detected faces get classified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FacePolicy {
    /// Classify every face; the first one supplies the primary label.
    #[default]
    AllFaces,
    /// Classify and report only the first face.
    PrimaryOnly,
}

/// Configuration for a [`PipelineCoordinator`](super::pipeline_coordinator::PipelineCoordinator).
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub face_policy: FacePolicy,
}

impl PipelineConfig {
    pub fn with_face_policy(mut self, face_policy: FacePolicy) -> Self {
        self.face_policy = face_policy;
        self
    }
}

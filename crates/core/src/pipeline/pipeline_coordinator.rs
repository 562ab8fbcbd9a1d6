use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crossbeam_channel::Sender;

use crate::capture::domain::camera_position::CameraPosition;
use crate::capture::domain::capture_error::CaptureError;
use crate::capture::domain::frame_source::FrameSource;
use crate::classification::domain::emotion::EmotionLabel;
use crate::classification::domain::emotion_classifier::EmotionClassifier;
use crate::detection::domain::face_locator::FaceLocator;
use crate::pipeline::emotion_result::{EmotionResult, FaceAnalysis};
use crate::pipeline::pipeline_config::{FacePolicy, PipelineConfig};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::pipeline_state::{Counter, CycleGuard, CycleState, PipelineState, PipelineStats};
use crate::pipeline::presentation::{PresentationEvent, PresentationReceiver};
use crate::preprocessing::domain::region_preprocessor::RegionPreprocessor;
use crate::shared::face_region::FaceRegion;
use crate::shared::frame::RawFrame;

/// What [`PipelineCoordinator::on_frame`] did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A full cycle ran and its result was published.
    Processed,
    /// A full cycle ran but the camera switched before it finished; the
    /// result was discarded.
    Superseded,
    /// Another cycle was running; the frame was dropped untouched.
    Busy,
    /// The frame was captured before the last camera switch.
    Stale,
}

/// Runs locate → preprocess → classify for one frame at a time and hands
/// results to the presentation side.
///
/// `on_frame` may be called from any thread; a frame that arrives while a
/// cycle is running is dropped, never queued. Every failure inside a cycle
/// ends up as an `Unknown` label rather than an error.
pub struct PipelineCoordinator {
    locator: Mutex<Box<dyn FaceLocator>>,
    preprocessor: RegionPreprocessor,
    classifier: Box<dyn EmotionClassifier>,
    config: PipelineConfig,
    state: PipelineState,
    logger: Mutex<Box<dyn PipelineLogger>>,
    events: Sender<PresentationEvent>,
}

impl PipelineCoordinator {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        preprocessor: RegionPreprocessor,
        classifier: Box<dyn EmotionClassifier>,
        config: PipelineConfig,
    ) -> (Self, PresentationReceiver) {
        let (events, event_rx) = crossbeam_channel::unbounded();
        let state = PipelineState::new(CameraPosition::Front);
        let receiver = PresentationReceiver::new(event_rx, state.generation().clone());
        let coordinator = Self {
            locator: Mutex::new(locator),
            preprocessor,
            classifier,
            config,
            state,
            logger: Mutex::new(Box::new(NullPipelineLogger)),
            events,
        };
        (coordinator, receiver)
    }

    pub fn with_logger(self, logger: Box<dyn PipelineLogger>) -> Self {
        *lock(&self.logger) = logger;
        self
    }

    /// Records the position of the camera the coordinator starts with.
    pub fn with_camera_position(self, position: CameraPosition) -> Self {
        self.state.set_camera_position(position);
        self
    }

    /// Processes `frame` unless a cycle is already running.
    ///
    /// The frame is consumed and released when the cycle ends.
    pub fn on_frame(&self, frame: RawFrame) -> FrameOutcome {
        let generation = self.state.generation().current();
        if frame.epoch() < generation {
            self.state.count(Counter::DroppedStale);
            log::trace!(
                "Dropping frame {} from epoch {} (generation {generation})",
                frame.sequence(),
                frame.epoch()
            );
            return FrameOutcome::Stale;
        }

        let Some(cycle) = self.state.try_begin_cycle() else {
            self.state.count(Counter::DroppedBusy);
            return FrameOutcome::Busy;
        };
        self.state.count(Counter::Accepted);

        let faces = self.analyze(&frame, &cycle);
        let result = Arc::new(EmotionResult::new(generation, frame.sequence(), faces));
        drop(frame);
        cycle.transition(CycleState::Done);

        let outcome = self.publish(result);
        lock(&self.logger).cycle(self.state.stats().accepted);
        outcome
    }

    /// Switches the source to the opposite camera.
    ///
    /// As soon as the source has found the opposite camera, and before it
    /// tears down the old one, the overlay is cleared and the generation
    /// advanced, so nothing computed from the old camera is shown
    /// afterwards. When the opposite camera does not exist the source keeps
    /// running, the overlay is left as is, and
    /// [`CaptureError::NoDeviceAvailable`] is returned.
    pub fn toggle_camera(
        &self,
        source: &mut dyn FrameSource,
    ) -> Result<CameraPosition, CaptureError> {
        let target = source.position().opposite();
        let switched = source.switch_position(target, &|epoch: u64| self.begin_generation(epoch));
        match switched {
            Ok(epoch) => {
                self.state.set_camera_position(target);
                lock(&self.logger).info(&format!(
                    "Switched to {target} camera (generation {epoch})"
                ));
                Ok(target)
            }
            Err(e) => {
                log::warn!("Camera switch to {target} failed: {e}");
                Err(e)
            }
        }
    }

    /// The most recently published result, `None` once cleared by a switch.
    pub fn overlay(&self) -> Option<Arc<EmotionResult>> {
        self.state.overlay()
    }

    pub fn stats(&self) -> PipelineStats {
        self.state.stats()
    }

    pub fn cycle_state(&self) -> CycleState {
        self.state.cycle_state()
    }

    pub fn generation(&self) -> u64 {
        self.state.generation().current()
    }

    pub fn camera_position(&self) -> CameraPosition {
        self.state.camera_position()
    }

    /// Emits the logger's end-of-session summary.
    pub fn log_summary(&self) {
        lock(&self.logger).summary();
    }

    fn analyze(&self, frame: &RawFrame, cycle: &CycleGuard<'_>) -> Vec<FaceAnalysis> {
        let started = Instant::now();
        let located = lock(&self.locator).locate(frame);
        self.timing("detect", started);

        let regions = match located {
            Ok(regions) => regions,
            Err(e) => {
                self.state.count(Counter::DetectionFailure);
                log::warn!("Face location failed on frame {}: {e}", frame.sequence());
                Vec::new()
            }
        };
        lock(&self.logger).metric("faces", regions.len() as f64);

        if regions.is_empty() {
            cycle.transition(CycleState::NoFace);
            return Vec::new();
        }

        cycle.transition(CycleState::PerFaceProcessing);
        let limit = match self.config.face_policy {
            FacePolicy::AllFaces => regions.len(),
            FacePolicy::PrimaryOnly => 1,
        };
        regions
            .into_iter()
            .take(limit)
            .map(|region| FaceAnalysis {
                region,
                label: self.classify_region(frame, &region),
            })
            .collect()
    }

    fn classify_region(&self, frame: &RawFrame, region: &FaceRegion) -> EmotionLabel {
        let started = Instant::now();
        let preprocessed = self.preprocessor.preprocess(frame, Some(region));
        self.timing("preprocess", started);

        let buffer = match preprocessed {
            Ok(buffer) => buffer,
            Err(e) => {
                self.state.count(Counter::FaceFailure);
                log::debug!("Preprocessing failed for {region:?}: {e}");
                return EmotionLabel::Unknown;
            }
        };

        let started = Instant::now();
        let classified = self.classifier.classify(&buffer);
        self.timing("classify", started);

        match classified {
            Ok(emotion) => emotion.into(),
            Err(e) => {
                self.state.count(Counter::FaceFailure);
                log::debug!("Classification failed for {region:?}: {e}");
                EmotionLabel::Unknown
            }
        }
    }

    fn publish(&self, result: Arc<EmotionResult>) -> FrameOutcome {
        let mut overlay = self.state.lock_overlay();
        if self.state.generation().is_stale(result.generation()) {
            self.state.count(Counter::Superseded);
            log::debug!(
                "Discarding result for frame {} from generation {}",
                result.sequence(),
                result.generation()
            );
            return FrameOutcome::Superseded;
        }

        *overlay = Some(Arc::clone(&result));
        if self.events.send(PresentationEvent::Show(result)).is_err() {
            log::trace!("Presentation receiver is gone");
        }
        self.state.count(Counter::Published);
        FrameOutcome::Processed
    }

    fn begin_generation(&self, epoch: u64) {
        let mut overlay = self.state.lock_overlay();
        let generation = self.state.generation().advance_to(epoch);
        *overlay = None;
        if self
            .events
            .send(PresentationEvent::Clear { generation })
            .is_err()
        {
            log::trace!("Presentation receiver is gone");
        }
    }

    fn timing(&self, stage: &str, started: Instant) {
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        lock(&self.logger).timing(stage, ms);
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

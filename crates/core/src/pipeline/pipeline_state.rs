use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::capture::domain::camera_position::CameraPosition;

use super::emotion_result::EmotionResult;

/// Where the coordinator is within one processing cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CycleState {
    Idle = 0,
    Detecting = 1,
    NoFace = 2,
    PerFaceProcessing = 3,
    Done = 4,
}

impl CycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CycleState::Detecting,
            2 => CycleState::NoFace,
            3 => CycleState::PerFaceProcessing,
            4 => CycleState::Done,
            _ => CycleState::Idle,
        }
    }
}

/// Monotonic camera generation, shared between the coordinator and the
/// presentation receiver.
#[derive(Clone, Debug, Default)]
pub struct GenerationCounter(Arc<AtomicU64>);

impl GenerationCounter {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Raises the generation to `generation` if it is newer. Returns the
    /// resulting value.
    pub fn advance_to(&self, generation: u64) -> u64 {
        let previous = self.0.fetch_max(generation, Ordering::AcqRel);
        previous.max(generation)
    }

    pub fn is_stale(&self, generation: u64) -> bool {
        generation < self.current()
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames that started a cycle.
    pub accepted: u64,
    /// Frames dropped because a cycle was already running.
    pub dropped_busy: u64,
    /// Frames dropped because they predate the last camera switch.
    pub dropped_stale: u64,
    /// Results handed to presentation.
    pub published: u64,
    /// Completed cycles discarded because the camera switched mid-cycle.
    pub superseded: u64,
    /// Faces downgraded to `Unknown` by a preprocessing or classifier error.
    pub face_failures: u64,
    /// Cycles where the locator itself failed.
    pub detection_failures: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    dropped_busy: AtomicU64,
    dropped_stale: AtomicU64,
    published: AtomicU64,
    superseded: AtomicU64,
    face_failures: AtomicU64,
    detection_failures: AtomicU64,
}

/// Counter identifiers for [`PipelineState::count`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    Accepted,
    DroppedBusy,
    DroppedStale,
    Published,
    Superseded,
    FaceFailure,
    DetectionFailure,
}

/// Mutable state owned by the coordinator.
///
/// The cycle state is only ever left `Idle` through [`try_begin_cycle`],
/// a single compare-and-swap, so at most one cycle runs at a time no matter
/// how many threads deliver frames. The overlay lock also orders generation
/// changes against publishing.
///
/// [`try_begin_cycle`]: PipelineState::try_begin_cycle
pub struct PipelineState {
    cycle: AtomicU8,
    generation: GenerationCounter,
    overlay: Mutex<Option<Arc<EmotionResult>>>,
    camera_position: Mutex<CameraPosition>,
    counters: Counters,
}

impl PipelineState {
    pub fn new(camera_position: CameraPosition) -> Self {
        Self {
            cycle: AtomicU8::new(CycleState::Idle as u8),
            generation: GenerationCounter::default(),
            overlay: Mutex::new(None),
            camera_position: Mutex::new(camera_position),
            counters: Counters::default(),
        }
    }

    pub fn cycle_state(&self) -> CycleState {
        CycleState::from_u8(self.cycle.load(Ordering::Acquire))
    }

    /// Atomically moves `Idle → Detecting`. Returns `None` if a cycle is
    /// already running; the guard returns the state to `Idle` when dropped.
    pub fn try_begin_cycle(&self) -> Option<CycleGuard<'_>> {
        self.cycle
            .compare_exchange(
                CycleState::Idle as u8,
                CycleState::Detecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| CycleGuard { state: self })
    }

    pub fn generation(&self) -> &GenerationCounter {
        &self.generation
    }

    /// Locks the overlay slot. Hold it while checking the generation and
    /// publishing, or while advancing the generation and clearing.
    pub fn lock_overlay(&self) -> MutexGuard<'_, Option<Arc<EmotionResult>>> {
        self.overlay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn overlay(&self) -> Option<Arc<EmotionResult>> {
        self.lock_overlay().clone()
    }

    pub fn camera_position(&self) -> CameraPosition {
        *self
            .camera_position
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_camera_position(&self, position: CameraPosition) {
        *self
            .camera_position
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = position;
    }

    pub fn count(&self, counter: Counter) {
        let c = &self.counters;
        let slot = match counter {
            Counter::Accepted => &c.accepted,
            Counter::DroppedBusy => &c.dropped_busy,
            Counter::DroppedStale => &c.dropped_stale,
            Counter::Published => &c.published,
            Counter::Superseded => &c.superseded,
            Counter::FaceFailure => &c.face_failures,
            Counter::DetectionFailure => &c.detection_failures,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            accepted: c.accepted.load(Ordering::Relaxed),
            dropped_busy: c.dropped_busy.load(Ordering::Relaxed),
            dropped_stale: c.dropped_stale.load(Ordering::Relaxed),
            published: c.published.load(Ordering::Relaxed),
            superseded: c.superseded.load(Ordering::Relaxed),
            face_failures: c.face_failures.load(Ordering::Relaxed),
            detection_failures: c.detection_failures.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive right to run one cycle.
pub struct CycleGuard<'a> {
    state: &'a PipelineState,
}

impl CycleGuard<'_> {
    pub fn transition(&self, next: CycleState) {
        self.state.cycle.store(next as u8, Ordering::Release);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.state
            .cycle
            .store(CycleState::Idle as u8, Ordering::Release);
    }
}

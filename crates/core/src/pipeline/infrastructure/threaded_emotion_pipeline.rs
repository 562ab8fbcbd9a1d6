use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::capture::domain::camera_position::CameraPosition;
use crate::capture::domain::capture_error::CaptureError;
use crate::capture::domain::frame_source::{FrameDelivery, FrameHandler, FrameSource};
use crate::pipeline::pipeline_coordinator::PipelineCoordinator;
use crate::pipeline::pipeline_state::PipelineStats;
use crate::shared::frame::RawFrame;

/// A running capture session.
///
/// Layout: `source thread → [rendezvous] → worker → coordinator → presentation`
///
/// The hand-off channel has zero capacity, so the source can only pass a
/// frame while the worker is idle and waiting; anything captured during a
/// cycle is dropped at the source.
pub struct EmotionPipeline {
    source: Box<dyn FrameSource>,
    coordinator: Arc<PipelineCoordinator>,
    worker: Option<Worker>,
    source_dropped: Arc<AtomicU64>,
}

struct Worker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl EmotionPipeline {
    pub fn new(source: Box<dyn FrameSource>, coordinator: PipelineCoordinator) -> Self {
        let coordinator = coordinator.with_camera_position(source.position());
        Self {
            source,
            coordinator: Arc::new(coordinator),
            worker: None,
            source_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts the worker and then capture.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<RawFrame>(0);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = spawn_worker(Arc::clone(&self.coordinator), frame_rx, shutdown_rx);
        let worker = Worker {
            shutdown: shutdown_tx,
            handle,
        };

        if let Err(e) = self
            .source
            .start(frame_handler(frame_tx, Arc::clone(&self.source_dropped)))
        {
            join_worker(worker);
            return Err(e);
        }
        self.worker = Some(worker);
        log::info!("Pipeline started on {} camera", self.source.position());
        Ok(())
    }

    /// Switches to the opposite camera. See [`PipelineCoordinator::toggle_camera`].
    pub fn toggle_camera(&mut self) -> Result<CameraPosition, CaptureError> {
        self.coordinator.toggle_camera(self.source.as_mut())
    }

    /// Stops capture, then lets the worker finish its current cycle and exit.
    pub fn stop(&mut self) {
        self.source.stop();
        if let Some(worker) = self.worker.take() {
            join_worker(worker);
            log::info!("Pipeline stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn coordinator(&self) -> &PipelineCoordinator {
        &self.coordinator
    }

    /// Coordinator counters, with frames the source dropped while the
    /// worker was busy folded into `dropped_busy`.
    pub fn stats(&self) -> PipelineStats {
        let mut stats = self.coordinator.stats();
        stats.dropped_busy += self.source_dropped.load(Ordering::Relaxed);
        stats
    }
}

impl Drop for EmotionPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn frame_handler(frame_tx: Sender<RawFrame>, dropped: Arc<AtomicU64>) -> FrameHandler {
    Box::new(move |frame| match frame_tx.try_send(frame) {
        Ok(()) => FrameDelivery::Accepted,
        Err(TrySendError::Full(_)) => {
            dropped.fetch_add(1, Ordering::Relaxed);
            FrameDelivery::Dropped
        }
        Err(TrySendError::Disconnected(_)) => FrameDelivery::Closed,
    })
}

fn spawn_worker(
    coordinator: Arc<PipelineCoordinator>,
    frame_rx: Receiver<RawFrame>,
    shutdown_rx: Receiver<()>,
) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        crossbeam_channel::select! {
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => {
                    let outcome = coordinator.on_frame(frame);
                    log::trace!("Frame outcome: {outcome:?}");
                }
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    })
}

fn join_worker(worker: Worker) {
    drop(worker.shutdown);
    if worker.handle.join().is_err() {
        log::error!("Pipeline worker panicked");
    }
}

use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::shared::face_region::FaceRegion;

use super::emotion_result::EmotionResult;
use super::pipeline_state::GenerationCounter;

/// Renders overlays and the emotion label. Runs on the foreground side and
/// must return promptly.
pub trait PresentationSink {
    fn present(&mut self, label: &str, regions: &[FaceRegion]);

    fn clear_overlay(&mut self);

    /// Receives the full result. Default forwards the primary label and all
    /// regions to [`present`](Self::present).
    fn present_result(&mut self, result: &EmotionResult) {
        self.present(result.label().as_str(), &result.regions());
    }
}

/// Messages from the coordinator to the foreground.
#[derive(Clone, Debug)]
pub enum PresentationEvent {
    Show(Arc<EmotionResult>),
    /// The camera switched; drop whatever is on screen.
    Clear { generation: u64 },
}

/// Foreground end of the presentation hand-off.
///
/// Results from a generation older than the coordinator's current one are
/// discarded here, so a cycle that finished just after a camera switch never
/// reaches the sink.
pub struct PresentationReceiver {
    events: Receiver<PresentationEvent>,
    generation: GenerationCounter,
    discarded: u64,
}

impl PresentationReceiver {
    pub(crate) fn new(events: Receiver<PresentationEvent>, generation: GenerationCounter) -> Self {
        Self {
            events,
            generation,
            discarded: 0,
        }
    }

    /// Delivers every pending event without blocking. Returns how many
    /// reached the sink.
    pub fn pump(&mut self, sink: &mut dyn PresentationSink) -> usize {
        let mut delivered = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if self.deliver(event, sink) {
                        delivered += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        delivered
    }

    /// Blocks delivering events until the coordinator is dropped.
    pub fn run(mut self, sink: &mut dyn PresentationSink) {
        while let Ok(event) = self.events.recv() {
            self.deliver(event, sink);
        }
        log::debug!(
            "Presentation stopped ({} stale results discarded)",
            self.discarded
        );
    }

    /// Results dropped because their generation was stale.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn deliver(&mut self, event: PresentationEvent, sink: &mut dyn PresentationSink) -> bool {
        match event {
            PresentationEvent::Show(result) => {
                if self.generation.is_stale(result.generation()) {
                    self.discarded += 1;
                    log::trace!(
                        "Discarding result from generation {} (current {})",
                        result.generation(),
                        self.generation.current()
                    );
                    return false;
                }
                sink.present_result(&result);
                true
            }
            PresentationEvent::Clear { generation } => {
                log::debug!("Clearing overlay for generation {generation}");
                sink.clear_overlay();
                true
            }
        }
    }
}

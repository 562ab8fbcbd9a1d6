use crate::shared::frame::RawFrame;

use super::camera_position::CameraPosition;
use super::capture_error::CaptureError;

/// What happened to a frame offered to the registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDelivery {
    Accepted,
    /// The consumer was busy; the frame was discarded, not queued.
    Dropped,
    /// The consumer has gone away; capture should wind down.
    Closed,
}

/// Callback invoked once per captured frame on the capture thread.
pub type FrameHandler = Box<dyn FnMut(RawFrame) -> FrameDelivery + Send>;

/// Called once a switch has found its target device, before the old device
/// stops. Receives the new source epoch; every frame captured after the
/// switch carries at least that epoch.
pub type SwitchHook<'a> = &'a dyn Fn(u64);

/// A live camera input that pushes upright frames to a handler.
pub trait FrameSource: Send {
    /// Begins capture, delivering frames to `handler` on a background thread.
    fn start(&mut self, handler: FrameHandler) -> Result<(), CaptureError>;

    /// Stops capture. Idempotent.
    fn stop(&mut self);

    /// Rebuilds the input around the camera at `target`.
    ///
    /// When no device exists at `target` this returns
    /// [`CaptureError::NoDeviceAvailable`] without touching the running
    /// capture or calling `on_switch`. On success returns the new epoch.
    fn switch_position(
        &mut self,
        target: CameraPosition,
        on_switch: SwitchHook<'_>,
    ) -> Result<u64, CaptureError>;

    fn position(&self) -> CameraPosition;

    /// Advances each time a switch begins; stamped on every emitted frame.
    fn epoch(&self) -> u64;

    fn is_running(&self) -> bool;
}

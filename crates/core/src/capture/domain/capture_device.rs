use crate::shared::frame::RawFrame;

use super::camera_position::CameraPosition;
use super::capture_error::CaptureError;
use super::orientation::Orientation;

/// Physical sensor class, used to rank devices at the same position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Depth-sensing front module.
    TrueDepth,
    /// Combined dual-lens module.
    DualCamera,
    WideAngle,
    Other,
}

/// What discovery knows about a device before it is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceDescriptor {
    pub id: String,
    pub position: CameraPosition,
    pub kind: DeviceKind,
    pub orientation: Orientation,
}

/// An opened camera producing raw frames at its own rate.
///
/// `next_frame` blocks until the device has a frame. `Ok(None)` means the
/// device reached the end of its stream and will produce nothing further.
pub trait CaptureDevice: Send {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError>;
}

/// Enumerates and opens capture devices.
pub trait DeviceDiscovery: Send {
    /// Devices currently present, in no particular order.
    fn devices(&self) -> Vec<DeviceDescriptor>;

    fn open(&mut self, descriptor: &DeviceDescriptor) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

use thiserror::Error;

use super::camera_position::CameraPosition;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// No camera exists at the requested position. The previous source stays active.
    #[error("no capture device available at the {0} position")]
    NoDeviceAvailable(CameraPosition),
    #[error("failed to open capture device {id}: {reason}")]
    DeviceOpen { id: String, reason: String },
    #[error("capture device {id} failed to deliver a frame: {reason}")]
    DeviceRead { id: String, reason: String },
    #[error("frame source is already running")]
    AlreadyRunning,
    #[error("frame source is not running")]
    NotRunning,
}

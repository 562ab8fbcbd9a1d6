use std::path::PathBuf;

use crate::capture::domain::camera_position::CameraPosition;
use crate::capture::domain::capture_device::{
    CaptureDevice, DeviceDescriptor, DeviceDiscovery, DeviceKind,
};
use crate::capture::domain::capture_error::CaptureError;
use crate::capture::domain::orientation::Orientation;

use super::image_sequence_device::ImageSequenceDevice;

/// Discovery over image-sequence directories registered as cameras.
pub struct FileDeviceCatalog {
    entries: Vec<(DeviceDescriptor, PathBuf)>,
    fps: f64,
    looping: bool,
}

impl FileDeviceCatalog {
    pub fn new(fps: f64, looping: bool) -> Self {
        Self {
            entries: Vec::new(),
            fps,
            looping,
        }
    }

    /// Registers `dir` as an upright wide-angle camera at `position`.
    pub fn with_directory(self, position: CameraPosition, dir: PathBuf) -> Self {
        let descriptor = DeviceDescriptor {
            id: format!("{position}:{}", dir.display()),
            position,
            kind: DeviceKind::WideAngle,
            orientation: Orientation::UPRIGHT,
        };
        self.with_device(descriptor, dir)
    }

    pub fn with_device(mut self, descriptor: DeviceDescriptor, dir: PathBuf) -> Self {
        self.entries.push((descriptor, dir));
        self
    }

    pub fn has_position(&self, position: CameraPosition) -> bool {
        self.entries.iter().any(|(d, _)| d.position == position)
    }
}

impl DeviceDiscovery for FileDeviceCatalog {
    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.entries.iter().map(|(d, _)| d.clone()).collect()
    }

    fn open(&mut self, descriptor: &DeviceDescriptor) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let (_, dir) = self
            .entries
            .iter()
            .find(|(d, _)| d.id == descriptor.id)
            .ok_or_else(|| CaptureError::DeviceOpen {
                id: descriptor.id.clone(),
                reason: "device is not registered".into(),
            })?;
        let device = ImageSequenceDevice::from_dir(dir, self.fps, self.looping)?
            .with_id(descriptor.id.clone());
        log::debug!("Opened {} with {} images", descriptor.id, device.len());
        Ok(Box::new(device))
    }
}

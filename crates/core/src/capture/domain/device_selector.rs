use super::camera_position::CameraPosition;
use super::capture_device::{DeviceDescriptor, DeviceKind};

pub type Predicate = Box<dyn Fn(&DeviceDescriptor) -> bool + Send + Sync>;

/// Picks a device for a camera position from an ordered list of predicates.
///
/// Predicates are tried in order against every device at the requested
/// position; the first predicate with any match wins, and within it the
/// first matching device in discovery order.
pub struct DeviceSelector {
    preferences: Vec<Predicate>,
}

impl DeviceSelector {
    pub fn new(preferences: Vec<Predicate>) -> Self {
        Self { preferences }
    }

    /// Prefers depth, then combined, then wide sensors, else any camera.
    pub fn by_kind(kinds: &[DeviceKind]) -> Self {
        let mut preferences: Vec<Predicate> = kinds
            .iter()
            .map(|&kind| -> Predicate { Box::new(move |d: &DeviceDescriptor| d.kind == kind) })
            .collect();
        preferences.push(Box::new(|_: &DeviceDescriptor| true));
        Self::new(preferences)
    }

    pub fn select<'a>(
        &self,
        devices: &'a [DeviceDescriptor],
        position: CameraPosition,
    ) -> Option<&'a DeviceDescriptor> {
        self.preferences.iter().find_map(|matches| {
            devices
                .iter()
                .find(|d| d.position == position && matches(d))
        })
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::by_kind(&[
            DeviceKind::TrueDepth,
            DeviceKind::DualCamera,
            DeviceKind::WideAngle,
        ])
    }
}

use std::fmt;

/// Which side of the device a camera faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraPosition {
    Front,
    Back,
}

impl CameraPosition {
    pub fn opposite(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
        }
    }
}

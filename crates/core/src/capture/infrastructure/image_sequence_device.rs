use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::capture::domain::capture_device::CaptureDevice;
use crate::capture::domain::capture_error::CaptureError;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{PixelFormat, RawFrame};

/// Plays a directory of still images back as a camera.
///
/// Files are decoded lazily with the `image` crate, one per `next_frame`,
/// in file-name order and paced to the configured frame rate.
pub struct ImageSequenceDevice {
    id: String,
    files: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    frame_interval: Option<Duration>,
    last_emit: Option<Instant>,
}

impl ImageSequenceDevice {
    /// Collects every image file directly inside `dir`.
    ///
    /// `fps == 0.0` disables pacing.
    pub fn from_dir(dir: &Path, fps: f64, looping: bool) -> Result<Self, CaptureError> {
        let id = dir.display().to_string();
        let entries = std::fs::read_dir(dir).map_err(|e| CaptureError::DeviceOpen {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::DeviceOpen {
                id,
                reason: "directory contains no images".into(),
            });
        }

        Ok(Self::from_files(id, files, fps, looping))
    }

    pub fn from_files(id: String, files: Vec<PathBuf>, fps: f64, looping: bool) -> Self {
        let frame_interval = (fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));
        Self {
            id,
            files,
            cursor: 0,
            looping,
            frame_interval,
            last_emit: None,
        }
    }

    /// Replaces the id reported in read errors.
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_emit) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError> {
        if self.cursor >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let path = &self.files[self.cursor];
        self.cursor += 1;

        let image = image::open(path)
            .map_err(|e| CaptureError::DeviceRead {
                id: self.id.clone(),
                reason: format!("{}: {e}", path.display()),
            })?
            .to_rgb8();
        let (width, height) = image.dimensions();
        let frame = RawFrame::new(image.into_raw(), width, height, PixelFormat::Rgb8);

        self.pace();
        Ok(Some(frame))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

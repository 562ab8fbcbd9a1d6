use image::{imageops, ImageBuffer, Luma, Pixel, Rgb, Rgba};

use crate::shared::frame::{PixelFormat, RawFrame};

/// Clockwise rotation that brings a sensor image upright.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

/// How a device's raw output maps onto the fixed upright orientation.
///
/// Front cameras are typically mirrored so the preview behaves like a mirror;
/// the mirror is applied after rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Orientation {
    pub rotation: Rotation,
    pub mirrored: bool,
}

impl Orientation {
    pub const UPRIGHT: Orientation = Orientation {
        rotation: Rotation::None,
        mirrored: false,
    };

    pub fn new(rotation: Rotation, mirrored: bool) -> Self {
        Self { rotation, mirrored }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::UPRIGHT
    }

    /// Returns the frame re-laid out upright. Sequence and epoch are preserved.
    pub fn normalize(&self, frame: RawFrame) -> RawFrame {
        if self.is_identity() || !frame.is_well_formed() {
            return frame;
        }

        let (width, height, format) = (frame.width(), frame.height(), frame.format());
        let (sequence, epoch) = (frame.sequence(), frame.epoch());
        let data = frame.into_data();
        // Byte order within a pixel is irrelevant to a rotation, so BGRA rides as RGBA.
        let upright = match format {
            PixelFormat::Gray8 => self.reorient::<Luma<u8>>(width, height, data),
            PixelFormat::Rgb8 => self.reorient::<Rgb<u8>>(width, height, data),
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => {
                self.reorient::<Rgba<u8>>(width, height, data)
            }
        };
        match upright {
            Some((out_w, out_h, data)) => {
                RawFrame::new(data, out_w, out_h, format).stamped(sequence, epoch)
            }
            None => {
                log::warn!("Could not reorient {width}x{height} {format:?} frame {sequence}");
                RawFrame::new(Vec::new(), 0, 0, format).stamped(sequence, epoch)
            }
        }
    }

    fn reorient<P>(&self, width: u32, height: u32, data: Vec<u8>) -> Option<(u32, u32, Vec<u8>)>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        let image = ImageBuffer::<P, Vec<u8>>::from_raw(width, height, data)?;
        let rotated = match self.rotation {
            Rotation::None => image,
            Rotation::Clockwise90 => imageops::rotate90(&image),
            Rotation::Clockwise180 => imageops::rotate180(&image),
            Rotation::Clockwise270 => imageops::rotate270(&image),
        };
        let upright = if self.mirrored {
            imageops::flip_horizontal(&rotated)
        } else {
            rotated
        };
        Some((upright.width(), upright.height(), upright.into_raw()))
    }
}

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use thiserror::Error;

use crate::shared::constants::CLASSIFIER_INPUT_SIZE;
use crate::shared::face_region::{FaceRegion, PixelRect};
use crate::shared::frame::{PixelFormat, RawFrame};

use super::preprocessed_buffer::PreprocessedBuffer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("face region has zero area after clamping")]
    ZeroArea,
    #[error("frame has {actual} bytes, expected {expected}")]
    MalformedFrame { expected: usize, actual: usize },
    #[error("frame has no pixels")]
    EmptyFrame,
}

/// Turns a face crop into classifier input.
///
/// Stages: crop to the clamped region, convert to Rec.601 luma, resize to
/// 48x48 with a triangle (bilinear) filter ignoring aspect ratio, scale to
/// `[0, 1]`. Pure and deterministic: the same frame and region always give a
/// bit-identical buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegionPreprocessor {
    filter: Filter,
}

/// Interpolation used by the resize stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    #[default]
    Bilinear,
}

impl RegionPreprocessor {
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }

    /// Preprocesses `region` of `frame`, or the whole frame when `region` is `None`.
    pub fn preprocess(
        &self,
        frame: &RawFrame,
        region: Option<&FaceRegion>,
    ) -> Result<PreprocessedBuffer, PreprocessError> {
        if !frame.is_well_formed() {
            return Err(PreprocessError::MalformedFrame {
                expected: frame.expected_len(),
                actual: frame.data().len(),
            });
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(PreprocessError::EmptyFrame);
        }

        let region = region.copied().unwrap_or_else(FaceRegion::full);
        let rect = region
            .to_pixel_rect(frame.width(), frame.height())
            .ok_or(PreprocessError::ZeroArea)?;

        let gray = crop_to_gray(frame, rect);
        let size = CLASSIFIER_INPUT_SIZE as u32;
        let resized = imageops::resize(&gray, size, size, self.filter.into());

        let samples = resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / u8::MAX as f32)
            .collect();
        // resize always yields exactly size * size samples
        PreprocessedBuffer::from_samples(samples).ok_or(PreprocessError::EmptyFrame)
    }
}

impl From<Filter> for FilterType {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => FilterType::Nearest,
            Filter::Bilinear => FilterType::Triangle,
        }
    }
}

/// Copies `rect` out of the frame as an 8-bit luma image.
fn crop_to_gray(frame: &RawFrame, rect: PixelRect) -> GrayImage {
    let format = frame.format();
    GrayImage::from_fn(rect.width, rect.height, |x, y| {
        Luma([luma(format, frame.pixel(rect.x + x, rect.y + y))])
    })
}

/// Rec.601 luma in integer arithmetic, rounded to nearest.
fn luma(format: PixelFormat, px: &[u8]) -> u8 {
    if format == PixelFormat::Gray8 {
        return px[0];
    }
    let (r, g, b) = format.rgb(px);
    let weighted = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((weighted + 500) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::CLASSIFIER_INPUT_LEN;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// RGB frame whose red channel ramps left to right and green top to bottom.
    fn gradient(width: u32, height: u32) -> RawFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(64);
            }
        }
        RawFrame::new(data, width, height, PixelFormat::Rgb8)
    }

    fn uniform(width: u32, height: u32, format: PixelFormat, value: u8) -> RawFrame {
        let len = (width * height) as usize * format.bytes_per_pixel();
        RawFrame::new(vec![value; len], width, height, format)
    }

    #[test]
    fn test_identical_inputs_give_identical_buffers() {
        let frame = gradient(640, 480);
        let region = FaceRegion::from_corners(0.2, 0.2, 0.6, 0.6);
        let pre = RegionPreprocessor::default();

        let a = pre.preprocess(&frame, Some(&region)).unwrap();
        let b = pre.preprocess(&frame, Some(&region)).unwrap();
        let a_bits: Vec<u32> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[rstest]
    #[case::scenario(FaceRegion::from_corners(0.2, 0.2, 0.6, 0.6))]
    #[case::tiny(FaceRegion::new(0.5, 0.5, 0.001, 0.001))]
    #[case::wide(FaceRegion::new(0.0, 0.4, 1.0, 0.1))]
    #[case::overhanging(FaceRegion::new(0.8, -0.3, 0.6, 0.6))]
    fn test_output_is_48x48_in_unit_range(#[case] region: FaceRegion) {
        let buf = RegionPreprocessor::default()
            .preprocess(&gradient(640, 480), Some(&region))
            .unwrap();
        assert_eq!(buf.len(), CLASSIFIER_INPUT_LEN);
        assert_eq!(buf.shape(), &[1, 48, 48, 1]);
        assert!(buf.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[rstest]
    #[case::white(255, 1.0)]
    #[case::black(0, 0.0)]
    fn test_uniform_frame_maps_to_extremes(#[case] value: u8, #[case] expected: f32) {
        let frame = uniform(64, 64, PixelFormat::Bgra8, value);
        let buf = RegionPreprocessor::default().preprocess(&frame, None).unwrap();
        for v in buf.as_slice() {
            assert_relative_eq!(*v, expected, epsilon = 1.0 / 255.0);
        }
    }

    #[test]
    fn test_crop_selects_region_pixels() {
        // Left half white, right half black.
        let (w, h) = (100u32, 50u32);
        let data: Vec<u8> = (0..h)
            .flat_map(|_| (0..w).map(|x| if x < w / 2 { 255 } else { 0 }))
            .collect();
        let frame = RawFrame::new(data, w, h, PixelFormat::Gray8);
        let pre = RegionPreprocessor::default();

        let left = pre
            .preprocess(&frame, Some(&FaceRegion::new(0.0, 0.0, 0.5, 1.0)))
            .unwrap();
        let right = pre
            .preprocess(&frame, Some(&FaceRegion::new(0.5, 0.0, 0.5, 1.0)))
            .unwrap();
        assert!(left.as_slice().iter().all(|v| *v == 1.0));
        assert!(right.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_out_of_bounds_region_is_clamped() {
        let frame = gradient(200, 100);
        let pre = RegionPreprocessor::default();
        let overhanging = FaceRegion::new(0.5, 0.5, 0.9, 0.9);
        let inside = FaceRegion::from_corners(0.5, 0.5, 1.0, 1.0);
        assert_eq!(
            pre.preprocess(&frame, Some(&overhanging)).unwrap(),
            pre.preprocess(&frame, Some(&inside)).unwrap()
        );
    }

    #[test]
    fn test_missing_region_uses_full_frame() {
        let frame = gradient(80, 60);
        let pre = RegionPreprocessor::default();
        assert_eq!(
            pre.preprocess(&frame, None).unwrap(),
            pre.preprocess(&frame, Some(&FaceRegion::full())).unwrap()
        );
    }

    #[rstest]
    #[case::zero_width(FaceRegion::new(0.3, 0.3, 0.0, 0.2))]
    #[case::outside(FaceRegion::new(1.2, 0.0, 0.3, 0.3))]
    #[case::inverted(FaceRegion::from_corners(0.6, 0.6, 0.2, 0.2))]
    fn test_zero_area_region_fails(#[case] region: FaceRegion) {
        let result = RegionPreprocessor::default().preprocess(&gradient(64, 64), Some(&region));
        assert_eq!(result, Err(PreprocessError::ZeroArea));
    }

    #[test]
    fn test_empty_frame_fails() {
        let frame = RawFrame::new(Vec::new(), 0, 0, PixelFormat::Gray8);
        let result = RegionPreprocessor::default().preprocess(&frame, None);
        assert_eq!(result, Err(PreprocessError::EmptyFrame));
    }

    #[rstest]
    #[case::red_rgb(PixelFormat::Rgb8, &[255, 0, 0], 76)]
    #[case::red_bgra(PixelFormat::Bgra8, &[0, 0, 255, 255], 76)]
    #[case::blue_bgra(PixelFormat::Bgra8, &[255, 0, 0, 255], 29)]
    #[case::green_rgba(PixelFormat::Rgba8, &[0, 255, 0, 255], 150)]
    #[case::white_rgb(PixelFormat::Rgb8, &[255, 255, 255], 255)]
    #[case::gray(PixelFormat::Gray8, &[77], 77)]
    fn test_luma_weights(#[case] format: PixelFormat, #[case] px: &[u8], #[case] expected: u8) {
        assert_eq!(luma(format, px), expected);
    }

    #[test]
    fn test_nearest_filter_is_supported() {
        let buf = RegionPreprocessor::new(Filter::Nearest)
            .preprocess(&uniform(10, 10, PixelFormat::Gray8, 51), None)
            .unwrap();
        assert!(buf.as_slice().iter().all(|v| *v == 51.0 / 255.0));
    }
}

/// A face rectangle in normalized `[0, 1] x [0, 1]` frame coordinates.
///
/// Origin is the top-left corner of the upright frame. Keeping regions
/// resolution-independent lets the presentation layer map them to any
/// display coordinate system without re-running detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An integer pixel rectangle inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from corner coordinates `(x1, y1)-(x2, y2)`.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// The full frame.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Normalizes a pixel-space box `[x1, y1, x2, y2]` against the frame size.
    pub fn from_pixel_box(bbox: [f64; 4], frame_w: u32, frame_h: u32) -> Self {
        let fw = frame_w.max(1) as f64;
        let fh = frame_h.max(1) as f64;
        Self::from_corners(bbox[0] / fw, bbox[1] / fh, bbox[2] / fw, bbox[3] / fh)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersects the region with the unit square.
    ///
    /// Non-finite coordinates collapse to an empty region.
    pub fn clamped(&self) -> Self {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }
        if self.x >= 0.0 && self.y >= 0.0 && self.right() <= 1.0 && self.bottom() <= 1.0 {
            return Self::new(self.x, self.y, self.width.max(0.0), self.height.max(0.0));
        }
        let x1 = self.x.clamp(0.0, 1.0);
        let y1 = self.y.clamp(0.0, 1.0);
        let width = (self.right().clamp(0.0, 1.0) - x1).max(0.0);
        let height = (self.bottom().clamp(0.0, 1.0) - y1).max(0.0);
        Self::new(x1, y1, width, height)
    }

    /// Maps the clamped region onto a `frame_w` x `frame_h` pixel grid.
    ///
    /// The left/top edges round down and the right/bottom edges round up so
    /// any region with non-zero normalized area covers at least one pixel.
    /// Returns `None` when the clamped region has zero area.
    pub fn to_pixel_rect(&self, frame_w: u32, frame_h: u32) -> Option<PixelRect> {
        let c = self.clamped();
        if c.area() <= 0.0 || frame_w == 0 || frame_h == 0 {
            return None;
        }
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        let x1 = ((c.x * fw).floor() as u32).min(frame_w - 1);
        let y1 = ((c.y * fh).floor() as u32).min(frame_h - 1);
        let x2 = ((c.right() * fw).ceil() as u32).clamp(x1 + 1, frame_w);
        let y2 = ((c.bottom() * fh).ceil() as u32).clamp(y1 + 1, frame_h);
        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_from_corners() {
        let r = FaceRegion::from_corners(0.2, 0.2, 0.6, 0.6);
        assert_relative_eq!(r.x, 0.2);
        assert_relative_eq!(r.width, 0.4);
        assert_relative_eq!(r.right(), 0.6);
        assert_relative_eq!(r.bottom(), 0.6);
    }

    #[test]
    fn test_from_pixel_box_normalizes() {
        let r = FaceRegion::from_pixel_box([128.0, 96.0, 384.0, 288.0], 640, 480);
        assert_relative_eq!(r.x, 0.2);
        assert_relative_eq!(r.y, 0.2);
        assert_relative_eq!(r.right(), 0.6);
        assert_relative_eq!(r.bottom(), 0.6);
    }

    #[test]
    fn test_clamped_inside_is_unchanged() {
        let r = FaceRegion::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(r.clamped(), r);
    }

    #[test]
    fn test_clamped_keeps_exact_size_of_located_box() {
        let r = FaceRegion::from_pixel_box([64.0, 48.0, 256.0, 240.0], 640, 480);
        let c = r.clamped();
        assert_eq!(c.width, r.width);
        assert_eq!(c.height, r.height);
    }

    #[test]
    fn test_clamped_negative_size_collapses() {
        let r = FaceRegion::new(0.5, 0.5, -0.1, 0.2).clamped();
        assert_eq!(r.width, 0.0);
        assert_eq!(r.height, 0.2);
    }

    #[test]
    fn test_clamped_partially_outside() {
        let r = FaceRegion::new(-0.2, 0.8, 0.5, 0.5).clamped();
        assert_relative_eq!(r.x, 0.0);
        assert_relative_eq!(r.width, 0.3);
        assert_relative_eq!(r.y, 0.8);
        assert_relative_eq!(r.height, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_clamped_fully_outside_has_zero_area() {
        let r = FaceRegion::new(1.5, 1.5, 0.2, 0.2).clamped();
        assert_relative_eq!(r.area(), 0.0);
    }

    #[test]
    fn test_clamped_nan_is_empty() {
        let r = FaceRegion::new(f64::NAN, 0.0, 0.5, 0.5).clamped();
        assert_relative_eq!(r.area(), 0.0);
    }

    #[test]
    fn test_negative_size_has_zero_area() {
        assert_relative_eq!(FaceRegion::new(0.5, 0.5, -0.1, 0.2).area(), 0.0);
    }

    #[test]
    fn test_to_pixel_rect_scenario() {
        let r = FaceRegion::from_corners(0.2, 0.2, 0.6, 0.6);
        let rect = r.to_pixel_rect(640, 480).unwrap();
        assert_eq!(
            rect,
            PixelRect {
                x: 128,
                y: 96,
                width: 256,
                height: 192
            }
        );
    }

    #[test]
    fn test_to_pixel_rect_tiny_region_covers_one_pixel() {
        let r = FaceRegion::new(0.5, 0.5, 1e-6, 1e-6);
        let rect = r.to_pixel_rect(10, 10).unwrap();
        assert_eq!(rect.width, 1);
        assert_eq!(rect.height, 1);
    }

    #[test]
    fn test_to_pixel_rect_touching_right_edge() {
        let r = FaceRegion::new(0.9, 0.0, 0.5, 1.0);
        let rect = r.to_pixel_rect(10, 10).unwrap();
        assert_eq!(rect.x, 9);
        assert_eq!(rect.width, 1);
    }

    #[rstest]
    #[case::zero_width(FaceRegion::new(0.1, 0.1, 0.0, 0.5))]
    #[case::zero_height(FaceRegion::new(0.1, 0.1, 0.5, 0.0))]
    #[case::outside(FaceRegion::new(2.0, 2.0, 0.5, 0.5))]
    fn test_to_pixel_rect_degenerate(#[case] region: FaceRegion) {
        assert!(region.to_pixel_rect(100, 100).is_none());
    }
}

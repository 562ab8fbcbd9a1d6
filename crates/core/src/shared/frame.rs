use ndarray::ArrayView3;

/// Memory layout of a captured frame's pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit blue, green, red, alpha. Native format of most mobile capture outputs.
    Bgra8,
    Rgba8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Returns `(r, g, b)` for the pixel starting at `px`.
    ///
    /// `px` must hold at least `bytes_per_pixel()` bytes.
    pub fn rgb(self, px: &[u8]) -> (u8, u8, u8) {
        match self {
            PixelFormat::Bgra8 => (px[2], px[1], px[0]),
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => (px[0], px[1], px[2]),
            PixelFormat::Gray8 => (px[0], px[0], px[0]),
        }
    }
}

/// A single captured camera frame: contiguous pixel bytes in row-major order.
///
/// Frames are handed to the pipeline by value and dropped at the end of the
/// cycle that consumed them; capture backends recycle their own storage, so
/// nothing downstream keeps a frame alive past one cycle.
#[derive(Clone, Debug)]
pub struct RawFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
    epoch: u64,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * format.bytes_per_pixel(),
            "data length must equal width * height * bytes_per_pixel"
        );
        Self {
            data,
            width,
            height,
            format,
            sequence: 0,
            epoch: 0,
        }
    }

    /// Stamps the capture sequence number and the source switch epoch.
    pub fn stamped(mut self, sequence: u64, epoch: u64) -> Self {
        self.sequence = sequence;
        self.epoch = epoch;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Position of this frame in its device's capture order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Switch epoch of the source when this frame was captured.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True when the byte length agrees with the declared dimensions and format.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * self.format.bytes_per_pixel()
    }

    /// Views the pixels as `[height, width, bytes_per_pixel]`.
    ///
    /// Returns `None` for malformed frames.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.format.bytes_per_pixel(),
            ),
            &self.data,
        )
        .ok()
    }

    /// Bytes of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = ((y as usize) * (self.width as usize) + x as usize) * bpp;
        &self.data[offset..offset + bpp]
    }
}

// THEORY:
// The `frame` module is the bridge between a caller's raw RGBA bytes and the
// engines. A `FrameView` is a borrowed, validated window onto someone else's
// buffer; a `PixelBuffer` is the owned raster every transform hands back.
//
// Key architectural principles:
// 1.  **Validate Once**: Geometry is checked when a view is built. After that,
//     `len == width * height * 4` is an invariant every engine can rely on, so
//     no engine has to guard its own indexing against inconsistent input.
// 2.  **Borrow In, Own Out**: Engines read through a `FrameView` and allocate a
//     fresh `PixelBuffer` for their output. They never keep a reference to the
//     input across calls.
// 3.  **Data Container**: Like `Pixel`, a `PixelBuffer` only knows how to index
//     and copy itself. It knows nothing about filtering.

pub mod frame {
    use crate::core_modules::pixel::pixel::{Byte, CHANNELS, Pixel};
    use crate::error::{Result, VisionError};

    fn expected_len(width: u32, height: u32) -> Result<usize> {
        if width == 0 || height == 0 {
            return Err(VisionError::DimensionMismatch(format!(
                "frame must be at least 1x1, got {width}x{height}"
            )));
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
            .ok_or_else(|| VisionError::DimensionMismatch(format!("{width}x{height} overflows usize")))
    }

    fn check_len(width: u32, height: u32, actual: usize) -> Result<()> {
        let expected = expected_len(width, height)?;
        if actual != expected {
            return Err(VisionError::DimensionMismatch(format!(
                "{width}x{height} RGBA frame needs {expected} bytes, got {actual}"
            )));
        }
        Ok(())
    }

    /// A borrowed, validated RGBA raster.
    #[derive(Debug, Clone, Copy)]
    pub struct FrameView<'a> {
        data: &'a [Byte],
        width: u32,
        height: u32,
    }

    impl<'a> FrameView<'a> {
        pub fn new(data: &'a [Byte], width: u32, height: u32) -> Result<Self> {
            check_len(width, height, data.len())?;
            Ok(Self { data, width, height })
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        pub fn as_bytes(&self) -> &'a [Byte] {
            self.data
        }

        pub fn pixel_count(&self) -> usize {
            self.width as usize * self.height as usize
        }

        /// Byte offset of the pixel at (`x`, `y`).
        #[inline]
        pub fn offset(&self, x: u32, y: u32) -> usize {
            (y as usize * self.width as usize + x as usize) * CHANNELS
        }

        #[inline]
        pub fn pixel(&self, x: u32, y: u32) -> Pixel {
            self.pixel_at(y as usize * self.width as usize + x as usize)
        }

        /// The pixel at flat pixel index `index` (row-major).
        #[inline]
        pub fn pixel_at(&self, index: usize) -> Pixel {
            let start = index * CHANNELS;
            Pixel::new(
                self.data[start],
                self.data[start + 1],
                self.data[start + 2],
                self.data[start + 3],
            )
        }

        /// Channel-0 sample at (`x`, `y`), the only channel optical flow reads.
        #[inline]
        pub fn sample(&self, x: usize, y: usize) -> i64 {
            self.data[(y * self.width as usize + x) * CHANNELS] as i64
        }

        pub fn same_size(&self, other: &FrameView<'_>) -> bool {
            self.width == other.width && self.height == other.height
        }

        pub fn to_buffer(&self) -> PixelBuffer {
            PixelBuffer {
                data: self.data.to_vec(),
                width: self.width,
                height: self.height,
            }
        }
    }

    /// An owned RGBA raster, row-major, four bytes per pixel.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PixelBuffer {
        data: Vec<Byte>,
        width: u32,
        height: u32,
    }

    impl PixelBuffer {
        pub fn new(data: Vec<Byte>, width: u32, height: u32) -> Result<Self> {
            check_len(width, height, data.len())?;
            Ok(Self { data, width, height })
        }

        /// A fully transparent black buffer of the given size.
        pub fn blank(width: u32, height: u32) -> Result<Self> {
            let len = expected_len(width, height)?;
            Ok(Self {
                data: vec![0; len],
                width,
                height,
            })
        }

        /// A blank buffer with the same geometry as `frame`.
        pub fn like(frame: &FrameView<'_>) -> Self {
            Self {
                data: vec![0; frame.as_bytes().len()],
                width: frame.width(),
                height: frame.height(),
            }
        }

        pub fn view(&self) -> FrameView<'_> {
            FrameView {
                data: &self.data,
                width: self.width,
                height: self.height,
            }
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        pub fn as_bytes(&self) -> &[Byte] {
            &self.data
        }

        pub fn into_raw(self) -> Vec<Byte> {
            self.data
        }

        pub fn pixel(&self, x: u32, y: u32) -> Pixel {
            self.view().pixel(x, y)
        }

        #[inline]
        pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
            let start = (y as usize * self.width as usize + x as usize) * CHANNELS;
            self.set_pixel_at_offset(start, pixel);
        }

        #[inline]
        pub(crate) fn set_pixel_at_offset(&mut self, start: usize, pixel: Pixel) {
            let bytes: [Byte; CHANNELS] = pixel.into();
            self.data[start..start + CHANNELS].copy_from_slice(&bytes);
        }
    }

    impl From<PixelBuffer> for image::RgbaImage {
        fn from(buffer: PixelBuffer) -> Self {
            let (width, height) = (buffer.width, buffer.height);
            // Length was validated on construction, so from_raw cannot fail here.
            image::RgbaImage::from_raw(width, height, buffer.data)
                .unwrap_or_else(|| image::RgbaImage::new(width, height))
        }
    }

    impl TryFrom<image::RgbaImage> for PixelBuffer {
        type Error = VisionError;

        fn try_from(image: image::RgbaImage) -> Result<Self> {
            let (width, height) = image.dimensions();
            PixelBuffer::new(image.into_raw(), width, height)
        }
    }
}

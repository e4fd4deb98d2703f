// THEORY:
// Face-region filters restrict a whole-frame effect to the boxes a face detector
// reports. The detector is not part of this crate; its output arrives as plain
// `BoundingBox` values, and whatever boxes the caller holds for the current
// frame are applied as a snapshot.
//
// Key architectural principles:
// 1.  **Filter Then Cut**: The chosen filter runs over the entire frame, and the
//     pixels inside each clipped box are copied from that result. Neighbourhood
//     filters (blur, pixelate) therefore see real context across the box edge.
// 2.  **Clip, Never Panic**: Boxes may hang off the frame or lie fully outside
//     it. Only the overlapping part is touched.
// 3.  **Mask Overlay**: The mask is scaled to a square as wide as the face and
//     alpha-blended with its top edge 15 pixels above the box, so it covers the
//     forehead the way the detector boxes tend to miss.

use crate::core_modules::filter::Filter;
use crate::core_modules::frame::frame::{FrameView, PixelBuffer};
use crate::core_modules::spatial_filters::DEFAULT_BLOCK_SIZE;
use crate::error::{Result, VisionError};
use image::imageops::{self, FilterType};
use log::debug;
use serde::{Deserialize, Serialize};

/// How far above the box the mask's top edge sits.
pub const MASK_LIFT: i64 = 15;

/// One detected face, in frame pixel coordinates. `x` and `y` may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The part of the box inside a `frame_width` x `frame_height` frame, as
    /// half-open `(x0, y0, x1, y1)`, or `None` when nothing overlaps.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = (self.x as i64).max(0);
        let y0 = (self.y as i64).max(0);
        let x1 = (self.x as i64 + self.width as i64).min(frame_width as i64);
        let y1 = (self.y as i64 + self.height as i64).min(frame_height as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceFilter {
    Greyscale,
    Blur,
    Hsv,
    Pixelate,
    Mask,
}

impl FaceFilter {
    /// The whole-frame filter cut into each box; `None` for `Mask`.
    pub fn frame_filter(self) -> Option<Filter> {
        match self {
            FaceFilter::Greyscale => Some(Filter::Greyscale),
            FaceFilter::Blur => Some(Filter::BoxBlur),
            FaceFilter::Hsv => Some(Filter::RgbToHsv { threshold: None }),
            FaceFilter::Pixelate => Some(Filter::Pixelate {
                block_size: DEFAULT_BLOCK_SIZE,
            }),
            FaceFilter::Mask => None,
        }
    }
}

impl std::str::FromStr for FaceFilter {
    type Err = VisionError;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "greyscale" | "grayscale" => Ok(FaceFilter::Greyscale),
            "blur" => Ok(FaceFilter::Blur),
            "hsv" => Ok(FaceFilter::Hsv),
            "pixelate" => Ok(FaceFilter::Pixelate),
            "mask" => Ok(FaceFilter::Mask),
            other => Err(VisionError::invalid("face filter", format!("unknown filter `{other}`"))),
        }
    }
}

/// Returns a copy of `frame` with `filter` applied inside every face box.
pub fn apply_face_filter(
    frame: FrameView<'_>,
    faces: &[BoundingBox],
    filter: FaceFilter,
    mask: Option<&PixelBuffer>,
) -> Result<PixelBuffer> {
    debug!("applying {filter:?} to {} face(s)", faces.len());
    match filter.frame_filter() {
        Some(frame_filter) => replace_regions(frame, faces, frame_filter),
        None => {
            let mask = mask.ok_or_else(|| VisionError::invalid("mask", "the mask filter needs a mask image"))?;
            Ok(overlay_masks(frame, faces, mask))
        }
    }
}

fn replace_regions(frame: FrameView<'_>, faces: &[BoundingBox], filter: Filter) -> Result<PixelBuffer> {
    let mut output = frame.to_buffer();
    let regions: Vec<_> = faces
        .iter()
        .filter_map(|face| face.clip(frame.width(), frame.height()))
        .collect();
    if regions.is_empty() {
        return Ok(output);
    }

    let filtered = filter.apply(frame)?;
    for (x0, y0, x1, y1) in regions {
        for y in y0..y1 {
            for x in x0..x1 {
                output.set_pixel(x, y, filtered.pixel(x, y));
            }
        }
    }
    Ok(output)
}

fn overlay_masks(frame: FrameView<'_>, faces: &[BoundingBox], mask: &PixelBuffer) -> PixelBuffer {
    let mut canvas: image::RgbaImage = frame.to_buffer().into();
    let mask_image: image::RgbaImage = mask.clone().into();

    for face in faces.iter().filter(|face| face.width > 0) {
        let scaled = imageops::resize(&mask_image, face.width, face.width, FilterType::Nearest);
        imageops::overlay(&mut canvas, &scaled, face.x as i64, face.y as i64 - MASK_LIFT);
    }

    // Geometry is unchanged, so the conversion back cannot fail.
    PixelBuffer::try_from(canvas).unwrap_or_else(|_| frame.to_buffer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;

    fn filled(width: u32, height: u32, pixel: Pixel) -> PixelBuffer {
        let data = (0..width * height).flat_map(|_| Vec::from(pixel)).collect();
        PixelBuffer::new(data, width, height).unwrap()
    }

    #[test]
    fn greyscale_only_inside_the_box() {
        let source = filled(10, 10, Pixel::new(100, 50, 0, 255));
        let faces = [BoundingBox::new(2, 3, 4, 2)];
        let output = apply_face_filter(source.view(), &faces, FaceFilter::Greyscale, None).unwrap();
        for y in 0..10 {
            for x in 0..10 {
                let inside = (2..6).contains(&x) && (3..5).contains(&y);
                let expected = if inside { Pixel::new(60, 60, 60, 255) } else { Pixel::new(100, 50, 0, 255) };
                assert_eq!(output.pixel(x, y), expected, "at ({x}, {y})");
            }
        }
    }

    #[test]
    fn boxes_are_clipped_to_the_frame() {
        let source = filled(6, 6, Pixel::new(30, 30, 30, 255));
        let faces = [BoundingBox::new(-2, -2, 4, 4), BoundingBox::new(20, 20, 5, 5)];
        let output = apply_face_filter(source.view(), &faces, FaceFilter::Greyscale, None).unwrap();
        assert_eq!(output.pixel(0, 0), Pixel::new(36, 36, 36, 255));
        assert_eq!(output.pixel(1, 1), Pixel::new(36, 36, 36, 255));
        assert_eq!(output.pixel(2, 2), Pixel::new(30, 30, 30, 255));
        assert_eq!(BoundingBox::new(20, 20, 5, 5).clip(6, 6), None);
        assert_eq!(BoundingBox::new(4, 1, 10, 2).clip(6, 6), Some((4, 1, 6, 3)));
    }

    #[test]
    fn no_faces_returns_an_unchanged_copy() {
        let source = filled(4, 4, Pixel::new(1, 2, 3, 4));
        let output = apply_face_filter(source.view(), &[], FaceFilter::Blur, None).unwrap();
        assert_eq!(output, source);
    }

    #[test]
    fn mask_requires_an_image() {
        let source = filled(4, 4, Pixel::default());
        let err = apply_face_filter(source.view(), &[], FaceFilter::Mask, None).unwrap_err();
        assert!(matches!(err, VisionError::InvalidParameter { name: "mask", .. }));
    }

    #[test]
    fn mask_is_scaled_to_face_width_and_lifted() {
        let source = filled(40, 40, Pixel::new(0, 0, 0, 255));
        let mask = filled(2, 2, Pixel::new(255, 0, 0, 255));
        let faces = [BoundingBox::new(5, 20, 4, 10)];
        let output = apply_face_filter(source.view(), &faces, FaceFilter::Mask, Some(&mask)).unwrap();

        let red = Pixel::new(255, 0, 0, 255);
        let black = Pixel::new(0, 0, 0, 255);
        assert_eq!(output.pixel(5, 5), red);
        assert_eq!(output.pixel(8, 8), red);
        assert_eq!(output.pixel(9, 5), black);
        assert_eq!(output.pixel(5, 4), black);
        assert_eq!(output.pixel(5, 9), black);
        assert_eq!(output.pixel(5, 20), black);
    }

    #[test]
    fn transparent_mask_pixels_keep_the_frame() {
        let source = filled(20, 20, Pixel::new(9, 9, 9, 255));
        let mask = filled(3, 3, Pixel::new(255, 255, 255, 0));
        let faces = [BoundingBox::new(0, 2, 6, 6)];
        let output = apply_face_filter(source.view(), &faces, FaceFilter::Mask, Some(&mask)).unwrap();
        assert_eq!(output, source);
    }

    #[test]
    fn filter_names_parse() {
        assert_eq!("Blur".parse::<FaceFilter>().unwrap(), FaceFilter::Blur);
        assert_eq!("grayscale".parse::<FaceFilter>().unwrap(), FaceFilter::Greyscale);
        assert!("sepia".parse::<FaceFilter>().is_err());
    }
}

// THEORY:
// Colour filters are point operations: every output pixel depends only on the
// source pixel at the same position. They share one traversal (`map_pixels`)
// and differ only in the per-pixel function.
//
// Key architectural principles:
// 1.  **Pure Transforms**: Each filter borrows a `FrameView` and returns a new
//     `PixelBuffer` of the same geometry. Alpha is always carried over from the
//     source pixel.
// 2.  **Compute Wide, Store Narrow**: Channel math runs in `f64`; the optional
//     `Threshold` is applied to those real values, and only then is the result
//     quantized into a byte.
// 3.  **Raw-Scale XYZ**: The XYZ matrix is applied to 0..255 channels without
//     normalising first. Results above 255 saturate on store. This matches the
//     images the demo has always shown; it is not colorimetric XYZ.

use crate::core_modules::frame::frame::{FrameView, PixelBuffer};
use crate::core_modules::pixel::pixel::{
    CHANNELS, ColourChannel, ComputedChannel, Pixel, Threshold, apply_threshold,
};

/// Linear sRGB (D65) to CIE XYZ.
pub const RGB_TO_XYZ: [[ComputedChannel; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

/// Brightness boost applied after averaging in `greyscale`.
pub const GREYSCALE_GAIN: ComputedChannel = 1.2;

/// Runs `f` over every pixel of `frame` into a freshly allocated buffer.
pub(crate) fn map_pixels(frame: FrameView<'_>, f: impl Fn(Pixel) -> Pixel) -> PixelBuffer {
    let mut output = PixelBuffer::like(&frame);
    for index in 0..frame.pixel_count() {
        let mapped = f(frame.pixel_at(index));
        output.set_pixel_at_offset(index * CHANNELS, mapped);
    }
    output
}

/// Average of R, G and B, brightened by 20% and capped at 255.
pub fn greyscale(frame: FrameView<'_>) -> PixelBuffer {
    map_pixels(frame, |pixel| {
        let grey = (pixel.average() * GREYSCALE_GAIN).min(255.0);
        Pixel::from_computed([grey; 3], pixel.alpha)
    })
}

/// Keeps only `channel`, zeroing the other two, then optionally binarises.
pub fn channel_split(frame: FrameView<'_>, channel: ColourChannel, threshold: Option<Threshold>) -> PixelBuffer {
    map_pixels(frame, |pixel| {
        let mut rgb = [0.0; 3];
        rgb[channel.index()] = pixel.channel(channel) as ComputedChannel;
        Pixel::from_computed(apply_threshold(rgb, threshold), pixel.alpha)
    })
}

/// Applies `RGB_TO_XYZ` to the raw 0..255 channels.
pub fn rgb_to_xyz(frame: FrameView<'_>, threshold: Option<Threshold>) -> PixelBuffer {
    map_pixels(frame, |pixel| {
        let rgb = pixel.computed();
        let xyz = RGB_TO_XYZ.map(|row| row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]);
        Pixel::from_computed(apply_threshold(xyz, threshold), pixel.alpha)
    })
}

/// Hue, saturation and value of one pixel, each in 0.0..=1.0.
pub fn hsv(pixel: Pixel) -> [ComputedChannel; 3] {
    let [r, g, b] = pixel.computed().map(|c| c / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    let hue = if delta == 0.0 {
        0.0
    } else {
        let sector = if max == r {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        sector / 6.0
    };

    [hue, saturation, max]
}

/// Stores H, S and V scaled to 0..255 in the R, G and B channels.
pub fn rgb_to_hsv(frame: FrameView<'_>, threshold: Option<Threshold>) -> PixelBuffer {
    map_pixels(frame, |pixel| {
        let scaled = hsv(pixel).map(|c| c * 255.0);
        Pixel::from_computed(apply_threshold(scaled, threshold), pixel.alpha)
    })
}

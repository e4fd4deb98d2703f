// THEORY:
// Spatial filters read a neighbourhood around each pixel instead of the pixel
// alone. Two are provided: kernel convolution (used for the box blur) and block
// pixelation.
//
// Boundary policy:
// -   `convolve` only writes pixels with `1 <= x < w-1` and `1 <= y < h-1`. The
//     one-pixel frame border is copied from the source unchanged.
// -   Inside that region, a tap is addressed by its flat pixel index
//     `(x + dx) + (y + dy) * w`, and that index is clamped into `0..w*h`. Taps
//     that fall off the left or right edge therefore wrap onto the neighbouring
//     row, and taps above the first row or below the last collapse onto the
//     first or last pixel. This matches the blur the demo has always produced.
//     The clamp works at pixel granularity, so a tap never reads a stray alpha
//     byte as a colour.
// -   `pixelate` clips tiles at the frame edge. A partial tile averages only the
//     pixels that exist, and is never padded with pixels from another row.

use crate::core_modules::frame::frame::{FrameView, PixelBuffer};
use crate::core_modules::kernel::Kernel;
use crate::core_modules::pixel::pixel::{ComputedChannel, Pixel};
use crate::error::{Result, VisionError};

/// Default tile edge for `pixelate`.
pub const DEFAULT_BLOCK_SIZE: u32 = 5;

/// Clamps a signed flat pixel index into the frame.
#[inline]
fn clamp_index(index: i64, pixel_count: usize) -> usize {
    index.clamp(0, pixel_count as i64 - 1) as usize
}

/// Convolves R, G and B with `kernel` over the frame interior.
pub fn convolve(frame: FrameView<'_>, kernel: &Kernel) -> PixelBuffer {
    let mut output = frame.to_buffer();
    let (width, height) = (frame.width(), frame.height());
    if width < 3 || height < 3 {
        return output;
    }

    let taps: Vec<(i64, i64, f64)> = kernel.taps().collect();
    let pixel_count = frame.pixel_count();
    let stride = width as i64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sum: [ComputedChannel; 3] = [0.0; 3];
            for &(dx, dy, weight) in &taps {
                let index = (x as i64 + dx) + (y as i64 + dy) * stride;
                let sample = frame.pixel_at(clamp_index(index, pixel_count)).computed();
                for (acc, value) in sum.iter_mut().zip(sample) {
                    *acc += value * weight;
                }
            }
            let alpha = frame.pixel(x, y).alpha;
            output.set_pixel(x, y, Pixel::from_computed(sum, alpha));
        }
    }

    output
}

/// 6x6 uniform box blur.
pub fn box_blur(frame: FrameView<'_>) -> PixelBuffer {
    convolve(frame, &Kernel::box_blur())
}

/// Replaces every pixel with the per-channel mean of its `block_size` tile.
pub fn pixelate(frame: FrameView<'_>, block_size: u32) -> Result<PixelBuffer> {
    if block_size == 0 {
        return Err(VisionError::invalid("block_size", "must be positive"));
    }
    let (width, height) = (frame.width(), frame.height());
    let mut output = PixelBuffer::like(&frame);

    for tile_y in (0..height).step_by(block_size as usize) {
        for tile_x in (0..width).step_by(block_size as usize) {
            let x_end = (tile_x + block_size).min(width);
            let y_end = (tile_y + block_size).min(height);

            let mut sum: [ComputedChannel; 3] = [0.0; 3];
            for y in tile_y..y_end {
                for x in tile_x..x_end {
                    for (acc, value) in sum.iter_mut().zip(frame.pixel(x, y).computed()) {
                        *acc += value;
                    }
                }
            }
            let count = ((x_end - tile_x) * (y_end - tile_y)) as ComputedChannel;
            let mean = sum.map(|total| total / count);

            for y in tile_y..y_end {
                for x in tile_x..x_end {
                    output.set_pixel(x, y, Pixel::from_computed(mean, frame.pixel(x, y).alpha));
                }
            }
        }
    }

    Ok(output)
}

// THEORY:
// The `Pixel` module holds the smallest units of the filter engine: a single RGBA
// sample, the colour channel selector, and the binarising threshold. Everything
// here is scoped to one pixel at a time; anything that needs neighbours (blur,
// pixelation, gradients) lives in higher modules.
//
// Key architectural principles:
// 1.  **Data Purity**: `Pixel` is a plain copyable container of four `u8` values.
// 2.  **Storage Semantics**: Filters compute in `f64` and store through
//     `quantize`, which rounds half to even and saturates into 0..=255. This is
//     the behaviour of the clamped byte arrays the filters were first written
//     against, so out-of-range results (XYZ on 0..255 input, brightened grey)
//     saturate instead of wrapping.
// 3.  **Validated Parameters**: `Threshold` can only be built inside 0..=255, so
//     every filter that accepts one can trust it without checking again.

pub mod pixel {
    use crate::error::{Result, VisionError};
    use serde::{Deserialize, Serialize};

    pub type Byte = u8;
    pub type Bytes = Vec<Byte>;
    pub type Channel = Byte;
    pub type ComputedChannel = f64;

    /// Number of interleaved samples per pixel (R, G, B, A).
    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// Builds a pixel from three computed channels, keeping `alpha` as-is.
        pub fn from_computed(rgb: [ComputedChannel; 3], alpha: Channel) -> Self {
            Pixel::new(quantize(rgb[0]), quantize(rgb[1]), quantize(rgb[2]), alpha)
        }

        /// The RGB channels as `f64` in their native 0..255 scale.
        pub fn computed(&self) -> [ComputedChannel; 3] {
            [
                self.red as ComputedChannel,
                self.green as ComputedChannel,
                self.blue as ComputedChannel,
            ]
        }

        /// Plain arithmetic mean of R, G and B.
        pub fn average(&self) -> ComputedChannel {
            (self.red as ComputedChannel + self.green as ComputedChannel + self.blue as ComputedChannel)
                / 3.0
        }

        pub fn channel(&self, channel: ColourChannel) -> Channel {
            match channel {
                ColourChannel::Red => self.red,
                ColourChannel::Green => self.green,
                ColourChannel::Blue => self.blue,
            }
        }
    }

    impl From<[Byte; CHANNELS]> for Pixel {
        fn from(bytes: [Byte; CHANNELS]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
        }
    }

    impl From<Pixel> for [Byte; CHANNELS] {
        fn from(pixel: Pixel) -> Self {
            [pixel.red, pixel.green, pixel.blue, pixel.alpha]
        }
    }

    impl From<Pixel> for Bytes {
        fn from(pixel: Pixel) -> Self {
            vec![pixel.red, pixel.green, pixel.blue, pixel.alpha]
        }
    }

    /// Stores a computed value into an 8-bit channel: round half to even, then
    /// saturate into 0..=255. NaN stores as 0.
    #[inline]
    pub fn quantize(value: ComputedChannel) -> Channel {
        value.round_ties_even().clamp(0.0, 255.0) as Channel
    }

    /// One of the three colour channels of an RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ColourChannel {
        Red,
        Green,
        Blue,
    }

    impl ColourChannel {
        pub const ALL: [ColourChannel; 3] = [ColourChannel::Red, ColourChannel::Green, ColourChannel::Blue];

        /// Offset of this channel inside an interleaved RGBA pixel.
        pub fn index(self) -> usize {
            match self {
                ColourChannel::Red => 0,
                ColourChannel::Green => 1,
                ColourChannel::Blue => 2,
            }
        }
    }

    /// A binarising cutoff in 0..=255, applied to each colour channel independently.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(try_from = "i64", into = "i64")]
    pub struct Threshold(u8);

    impl Threshold {
        /// The starting position of every threshold slider in the demo.
        pub const DEFAULT: Threshold = Threshold(127);

        pub fn new(value: i64) -> Result<Self> {
            u8::try_from(value)
                .map(Threshold)
                .map_err(|_| VisionError::invalid("threshold", format!("{value} is outside 0..=255")))
        }

        pub fn value(self) -> u8 {
            self.0
        }

        /// 255 when `value` is strictly greater than the cutoff, else 0.
        #[inline]
        pub fn binarize(self, value: ComputedChannel) -> ComputedChannel {
            if value > self.0 as ComputedChannel { 255.0 } else { 0.0 }
        }

        pub fn apply(self, rgb: [ComputedChannel; 3]) -> [ComputedChannel; 3] {
            rgb.map(|value| self.binarize(value))
        }
    }

    impl Default for Threshold {
        fn default() -> Self {
            Threshold::DEFAULT
        }
    }

    impl From<u8> for Threshold {
        fn from(value: u8) -> Self {
            Threshold(value)
        }
    }

    impl TryFrom<i64> for Threshold {
        type Error = VisionError;

        fn try_from(value: i64) -> Result<Self> {
            Threshold::new(value)
        }
    }

    impl From<Threshold> for i64 {
        fn from(threshold: Threshold) -> Self {
            threshold.0 as i64
        }
    }

    /// Applies an optional threshold; `None` passes the channels through.
    #[inline]
    pub fn apply_threshold(rgb: [ComputedChannel; 3], threshold: Option<Threshold>) -> [ComputedChannel; 3] {
        match threshold {
            Some(threshold) => threshold.apply(rgb),
            None => rgb,
        }
    }
}

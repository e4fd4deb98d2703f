// THEORY:
// `Filter` is the closed set of whole-frame transforms a caller can ask for. It
// turns the free functions of `colour_filters` and `spatial_filters` into a
// value that can be stored, sent to a worker, and applied later.

use crate::core_modules::colour_filters;
use crate::core_modules::frame::frame::{FrameView, PixelBuffer};
use crate::core_modules::pixel::pixel::{ColourChannel, Threshold};
use crate::core_modules::spatial_filters;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    Greyscale,
    ChannelSplit {
        channel: ColourChannel,
        threshold: Option<Threshold>,
    },
    RgbToXyz {
        threshold: Option<Threshold>,
    },
    RgbToHsv {
        threshold: Option<Threshold>,
    },
    BoxBlur,
    Pixelate {
        block_size: u32,
    },
}

impl Filter {
    pub fn apply(&self, frame: FrameView<'_>) -> Result<PixelBuffer> {
        Ok(match *self {
            Filter::Greyscale => colour_filters::greyscale(frame),
            Filter::ChannelSplit { channel, threshold } => colour_filters::channel_split(frame, channel, threshold),
            Filter::RgbToXyz { threshold } => colour_filters::rgb_to_xyz(frame, threshold),
            Filter::RgbToHsv { threshold } => colour_filters::rgb_to_hsv(frame, threshold),
            Filter::BoxBlur => spatial_filters::box_blur(frame),
            Filter::Pixelate { block_size } => spatial_filters::pixelate(frame, block_size)?,
        })
    }

    /// A short file-name friendly label, e.g. `red_split_t127`.
    pub fn label(&self) -> String {
        let suffix = |threshold: Option<Threshold>| match threshold {
            Some(t) => format!("_t{}", t.value()),
            None => String::new(),
        };
        match *self {
            Filter::Greyscale => "greyscale".to_string(),
            Filter::ChannelSplit { channel, threshold } => {
                let name = match channel {
                    ColourChannel::Red => "red",
                    ColourChannel::Green => "green",
                    ColourChannel::Blue => "blue",
                };
                format!("{name}_split{}", suffix(threshold))
            }
            Filter::RgbToXyz { threshold } => format!("xyz{}", suffix(threshold)),
            Filter::RgbToHsv { threshold } => format!("hsv{}", suffix(threshold)),
            Filter::BoxBlur => "blur".to_string(),
            Filter::Pixelate { block_size } => format!("pixelate_{block_size}"),
        }
    }
}

// THEORY:
// The `pipeline` module is the synchronous, top-level API of the engine. It wraps
// the pure building blocks in `core_modules` with the little state a live demo
// needs: the current configuration (including the threshold sliders) and the
// one-frame history of the flow tracker.
//
// Key architectural principles:
// 1.  **Recompute On Change**: Nothing is cached between frames except the flow
//     history. Moving a slider is `set_threshold` followed by another `gallery`
//     call on the next frame.
// 2.  **Single Source Of Layout**: `gallery_filters` defines which views the demo
//     shows and in what order. The parallel pipeline reuses it, so both produce
//     identical galleries.

use crate::config::{EngineConfig, ThresholdTarget};
use crate::core_modules::face_region::{self, BoundingBox, FaceFilter};
use crate::core_modules::filter::Filter;
use crate::core_modules::flow_tracker::FlowTracker;
use crate::core_modules::frame::frame::{FrameView, PixelBuffer};
use crate::core_modules::pixel::pixel::{ColourChannel, Threshold};
use crate::error::Result;
use log::debug;

// Re-export key data structures for the public API.
pub use crate::core_modules::optical_flow::{FlowResult, FlowZone, MotionSummary, zone_colour};

/// One processed frame of the flow stream.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowReport {
    pub flow: FlowResult,
    /// Zones above the configured significance threshold.
    pub summary: MotionSummary,
}

/// The filters of one gallery, in display order.
pub fn gallery_filters(config: &EngineConfig) -> Vec<Filter> {
    let thresholds = &config.thresholds;
    let mut filters = vec![Filter::Greyscale];
    filters.extend(ColourChannel::ALL.map(|channel| Filter::ChannelSplit { channel, threshold: None }));
    filters.extend(ColourChannel::ALL.map(|channel| Filter::ChannelSplit {
        channel,
        threshold: Some(thresholds.get(channel.into())),
    }));
    filters.push(Filter::RgbToXyz { threshold: None });
    filters.push(Filter::RgbToHsv { threshold: None });
    filters.push(Filter::RgbToXyz {
        threshold: Some(thresholds.xyz),
    });
    filters.push(Filter::RgbToHsv {
        threshold: Some(thresholds.hsv),
    });
    filters
}

pub struct FilterPipeline {
    config: EngineConfig,
    tracker: FlowTracker,
}

impl FilterPipeline {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let tracker = config.flow_tracker()?;
        Ok(Self { config, tracker })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Moves one threshold slider. Takes effect on the next `gallery` call.
    pub fn set_threshold(&mut self, target: ThresholdTarget, value: i64) -> Result<()> {
        let threshold = Threshold::new(value)?;
        debug!("threshold {target:?} set to {}", threshold.value());
        self.config.thresholds.set(target, threshold);
        Ok(())
    }

    pub fn threshold(&self, target: ThresholdTarget) -> Threshold {
        self.config.thresholds.get(target)
    }

    pub fn gallery_filters(&self) -> Vec<Filter> {
        gallery_filters(&self.config)
    }

    /// Every gallery view of `frame`, paired with the filter that made it.
    pub fn gallery(&self, frame: FrameView<'_>) -> Result<Vec<(Filter, PixelBuffer)>> {
        self.gallery_filters()
            .into_iter()
            .map(|filter| Ok((filter, filter.apply(frame)?)))
            .collect()
    }

    pub fn blur(&self, frame: FrameView<'_>) -> Result<PixelBuffer> {
        Filter::BoxBlur.apply(frame)
    }

    pub fn pixelate(&self, frame: FrameView<'_>) -> Result<PixelBuffer> {
        Filter::Pixelate {
            block_size: self.config.pixelate_block_size,
        }
        .apply(frame)
    }

    /// Feeds the next webcam frame to the flow tracker.
    pub fn track_flow(&mut self, frame: FrameView<'_>) -> Result<Option<FlowReport>> {
        let Some(flow) = self.tracker.observe(frame)? else {
            return Ok(None);
        };
        let summary = flow.motion_summary(self.config.significance_threshold);
        debug!(
            "flow report: {} zones, {} significant",
            flow.zones.len(),
            summary.count
        );
        Ok(Some(FlowReport { flow, summary }))
    }

    /// Draws the accepted zones of `flow` as filled squares over a copy of `frame`.
    pub fn render_flow(&self, frame: FrameView<'_>, flow: &FlowResult) -> PixelBuffer {
        let mut canvas = frame.to_buffer();
        let step = self.config.flow_step;
        let half = step as i64;
        let (width, height) = (frame.width() as i64, frame.height() as i64);
        for zone in flow.significant_zones(self.config.significance_threshold) {
            let colour = zone_colour(zone, step).into();
            let (x, y) = (zone.x as i64, zone.y as i64);
            let x_range = (x - half).max(0)..(x + half + 1).min(width);
            let y_range = (y - half).max(0)..(y + half + 1).min(height);
            for y in y_range {
                for x in x_range.clone() {
                    canvas.set_pixel(x as u32, y as u32, colour);
                }
            }
        }
        canvas
    }

    pub fn face_filter(
        &self,
        frame: FrameView<'_>,
        faces: &[BoundingBox],
        filter: FaceFilter,
        mask: Option<&PixelBuffer>,
    ) -> Result<PixelBuffer> {
        face_region::apply_face_filter(frame, faces, filter, mask)
    }
}

// THEORY:
// The `FlowTracker` is the stateful half of optical flow. The estimator itself
// is a pure function of two frames; the tracker owns the one frame of history a
// live feed needs and decides when a new frame is worth a calculation.
//
// Key architectural principles:
// 1.  **One Frame Of Memory**: Only the last accepted frame is kept, as an owned
//     copy. The caller's buffer is never retained.
// 2.  **Skip Duplicates**: A frame that the strided probe reports as identical to
//     the stored one produces no result and does not replace the history, so the
//     next real frame is compared against the last real change.
// 3.  **Reset On Resize**: A frame of different geometry cannot be compared. It
//     becomes the new history and the call reports `DimensionMismatch`, so the
//     following frame of the new size works normally.

use crate::core_modules::frame::frame::{FrameView, PixelBuffer};
use crate::core_modules::frame_diff::{DEFAULT_STRIDE, same_frame};
use crate::core_modules::optical_flow::{FlowResult, OpticalFlowEstimator};
use crate::error::{Result, VisionError};
use log::{debug, warn};

#[derive(Debug, Clone)]
pub struct FlowTracker {
    estimator: OpticalFlowEstimator,
    previous: Option<PixelBuffer>,
    diff_stride: usize,
    /// Bytes probed by the duplicate check. `None` probes the whole frame.
    diff_sample_count: Option<usize>,
}

impl Default for FlowTracker {
    fn default() -> Self {
        Self {
            estimator: OpticalFlowEstimator::default(),
            previous: None,
            diff_stride: DEFAULT_STRIDE,
            diff_sample_count: None,
        }
    }
}

impl FlowTracker {
    pub fn new(estimator: OpticalFlowEstimator, diff_stride: usize, diff_sample_count: Option<usize>) -> Result<Self> {
        if diff_stride == 0 {
            return Err(VisionError::invalid("diff_stride", "must be positive"));
        }
        Ok(Self {
            estimator,
            previous: None,
            diff_stride,
            diff_sample_count,
        })
    }

    pub fn estimator(&self) -> &OpticalFlowEstimator {
        &self.estimator
    }

    pub fn previous(&self) -> Option<&PixelBuffer> {
        self.previous.as_ref()
    }

    /// Forgets the stored frame.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Feeds the next frame of the stream.
    pub fn observe(&mut self, frame: FrameView<'_>) -> Result<Option<FlowResult>> {
        let Some(previous) = self.previous.as_ref() else {
            debug!("flow tracker primed with a {}x{} frame", frame.width(), frame.height());
            self.previous = Some(frame.to_buffer());
            return Ok(None);
        };

        let previous_view = previous.view();
        if !previous_view.same_size(&frame) {
            warn!(
                "frame size changed from {}x{} to {}x{}, resetting flow history",
                previous_view.width(),
                previous_view.height(),
                frame.width(),
                frame.height()
            );
            let message = format!(
                "previous frame is {}x{}, current frame is {}x{}",
                previous_view.width(),
                previous_view.height(),
                frame.width(),
                frame.height()
            );
            self.previous = Some(frame.to_buffer());
            return Err(VisionError::DimensionMismatch(message));
        }

        let len = frame.as_bytes().len();
        let sample_count = self.diff_sample_count.map_or(len, |count| count.min(len));
        if same_frame(previous_view.as_bytes(), frame.as_bytes(), self.diff_stride, sample_count)? {
            debug!("duplicate frame skipped");
            return Ok(None);
        }

        let result = self.estimator.calculate(previous_view, frame)?;
        self.previous = Some(frame.to_buffer());
        Ok(Some(result))
    }
}

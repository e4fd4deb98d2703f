// THEORY:
// The `OpticalFlowEstimator` turns two consecutive frames into a sparse field of
// motion vectors with a block-wise Lucas-Kanade solve.
//
// Algorithm:
// 1.  **Window Grid**: The frame interior (minus a `step + 1` border) is tiled
//     with non-overlapping square windows of side `2 * step + 1`, anchored at
//     `(step + 1, step + 1)`.
// 2.  **Gradients**: For every pixel in a window, only channel 0 is read. The
//     spatial gradients are central differences on the new frame (left minus
//     right, above minus below); the temporal gradient is old minus new.
// 3.  **Normal Equations**: Five running sums (`A2`, `A1B2`, `B1`, `C2`, `C1`)
//     build the 2x2 least-squares system. A non-singular system is solved by
//     Cramer's rule scaled by `step`. A singular one falls back to flow along
//     the gradient direction, or to zero when there is no gradient at all.
// 4.  **Outlier Gate**: Vectors with either component at least one window span
//     in magnitude are numerically unstable and dropped.
//
// The sums are accumulated in integers (every term is a product of 8-bit
// differences), so the singularity test `delta == 0` is exact.

use crate::core_modules::frame::frame::FrameView;
use crate::core_modules::pixel::pixel::{Channel, quantize};
use crate::error::{Result, VisionError};
use log::{debug, trace};

/// Default window half-size.
pub const DEFAULT_STEP: u32 = 8;

/// Largest half-size whose window span `2 * step + 1` still fits in a `u32`.
pub const MAX_STEP: u32 = (u32::MAX - 1) / 2;

/// One accepted window: its anchor and estimated velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowZone {
    pub x: u32,
    pub y: u32,
    pub u: f64,
    pub v: f64,
}

/// Counts and totals of the zones that moved more than a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionSummary {
    pub count: usize,
    pub total_u: f64,
    pub total_v: f64,
}

/// All accepted zones of one `calculate` call plus their mean velocity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowResult {
    pub zones: Vec<FlowZone>,
    /// Mean `u` over `zones`, or 0 when there are none.
    pub u: f64,
    /// Mean `v` over `zones`, or 0 when there are none.
    pub v: f64,
}

impl FlowResult {
    fn from_zones(zones: Vec<FlowZone>) -> Self {
        if zones.is_empty() {
            return FlowResult::default();
        }
        let count = zones.len() as f64;
        let (total_u, total_v) = zones
            .iter()
            .fold((0.0, 0.0), |(u, v), zone| (u + zone.u, v + zone.v));
        FlowResult {
            u: total_u / count,
            v: total_v / count,
            zones,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zones whose `|u|` or `|v|` exceeds `threshold`.
    pub fn significant_zones(&self, threshold: f64) -> impl Iterator<Item = &FlowZone> + '_ {
        self.zones
            .iter()
            .filter(move |zone| zone.u.abs() > threshold || zone.v.abs() > threshold)
    }

    /// Totals over the significant zones. A frame whose mean flow is zero on
    /// either axis is treated as still and reports nothing.
    pub fn motion_summary(&self, threshold: f64) -> MotionSummary {
        if self.u == 0.0 || self.v == 0.0 {
            return MotionSummary::default();
        }
        self.significant_zones(threshold)
            .fold(MotionSummary::default(), |summary, zone| MotionSummary {
                count: summary.count + 1,
                total_u: summary.total_u + zone.u,
                total_v: summary.total_v + zone.v,
            })
    }
}

/// Display colour of a zone: `u` and `v` mapped linearly from
/// `-step..=step` onto red and green, blue fixed at 128.
pub fn zone_colour(zone: &FlowZone, step: u32) -> [Channel; 4] {
    let span = step.max(1) as f64;
    let map = |value: f64| quantize((value + span) / (2.0 * span) * 255.0);
    [map(zone.u), map(zone.v), 128, 255]
}

/// The five normal-equation sums of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowSums {
    pub a2: i64,
    pub a1b2: i64,
    pub b1: i64,
    pub c1: i64,
    pub c2: i64,
}

impl WindowSums {
    #[inline]
    fn accumulate(&mut self, grad_x: i64, grad_y: i64, grad_t: i64) {
        self.a2 += grad_x * grad_x;
        self.a1b2 += grad_x * grad_y;
        self.b1 += grad_y * grad_y;
        self.c2 += grad_x * grad_t;
        self.c1 += grad_y * grad_t;
    }

    /// Solves for `(u, v)`, scaled by `step`.
    pub fn solve(&self, step: u32) -> (f64, f64) {
        let step = step as f64;
        let (a2, a1b2, b1, c1, c2) = (
            self.a2 as i128,
            self.a1b2 as i128,
            self.b1 as i128,
            self.c1 as i128,
            self.c2 as i128,
        );

        let delta = a1b2 * a1b2 - a2 * b1;
        if delta != 0 {
            let inverse_delta = step / delta as f64;
            let delta_x = -(c1 * a1b2 - c2 * b1);
            let delta_y = -(a1b2 * c2 - a2 * c1);
            return (delta_x as f64 * inverse_delta, delta_y as f64 * inverse_delta);
        }

        // Singular: move along the gradient direction instead.
        let norm = (a1b2 + a2) * (a1b2 + a2) + (b1 + a1b2) * (b1 + a1b2);
        if norm == 0 {
            return (0.0, 0.0);
        }
        let temp = -((c1 + c2) as f64) * (step / norm as f64);
        ((a1b2 + a2) as f64 * temp, (b1 + a1b2) as f64 * temp)
    }
}

/// Block-wise Lucas-Kanade flow between two equally sized frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpticalFlowEstimator {
    step: u32,
}

impl Default for OpticalFlowEstimator {
    fn default() -> Self {
        Self { step: DEFAULT_STEP }
    }
}

impl OpticalFlowEstimator {
    pub fn new(step: u32) -> Result<Self> {
        if step == 0 {
            return Err(VisionError::invalid("step", "window half-size must be positive"));
        }
        if step > MAX_STEP {
            return Err(VisionError::invalid("step", format!("{step} exceeds the largest half-size {MAX_STEP}")));
        }
        Ok(Self { step })
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Side of one window, `2 * step + 1`.
    pub fn window_span(&self) -> u32 {
        2 * self.step + 1
    }

    /// True when both components are strictly inside one window span.
    pub fn accepts(&self, u: f64, v: f64) -> bool {
        let span = self.window_span() as f64;
        u.abs() < span && v.abs() < span
    }

    // Anchor must lie at least `step + 1` pixels inside every edge.
    fn window_sums(&self, old: &FrameView<'_>, new: &FrameView<'_>, anchor_x: usize, anchor_y: usize) -> WindowSums {
        let step = self.step as usize;
        let mut sums = WindowSums::default();
        for y in anchor_y - step..=anchor_y + step {
            for x in anchor_x - step..=anchor_x + step {
                let grad_x = new.sample(x - 1, y) - new.sample(x + 1, y);
                let grad_y = new.sample(x, y - 1) - new.sample(x, y + 1);
                let grad_t = old.sample(x, y) - new.sample(x, y);
                sums.accumulate(grad_x, grad_y, grad_t);
            }
        }
        sums
    }

    /// Estimates flow from `old` to `new`.
    pub fn calculate(&self, old: FrameView<'_>, new: FrameView<'_>) -> Result<FlowResult> {
        if !old.same_size(&new) {
            return Err(VisionError::DimensionMismatch(format!(
                "previous frame is {}x{}, current frame is {}x{}",
                old.width(),
                old.height(),
                new.width(),
                new.height()
            )));
        }

        let border = self.step as usize + 1;
        let span = self.window_span() as usize;
        let x_max = (old.width() as usize).saturating_sub(border);
        let y_max = (old.height() as usize).saturating_sub(border);

        let mut zones = Vec::new();
        for anchor_y in (border..y_max).step_by(span) {
            for anchor_x in (border..x_max).step_by(span) {
                let sums = self.window_sums(&old, &new, anchor_x, anchor_y);
                let (u, v) = sums.solve(self.step);
                trace!("window ({anchor_x}, {anchor_y}): {sums:?} -> u={u:.3} v={v:.3}");
                if self.accepts(u, v) {
                    zones.push(FlowZone {
                        x: anchor_x as u32,
                        y: anchor_y as u32,
                        u,
                        v,
                    });
                }
            }
        }

        let result = FlowResult::from_zones(zones);
        debug!(
            "optical flow {}x{} step {}: {} zones, mean ({:.3}, {:.3})",
            old.width(),
            old.height(),
            self.step,
            result.zones.len(),
            result.u,
            result.v
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::frame::PixelBuffer;

    /// A smooth 2D texture, shifted right by `shift` pixels.
    fn textured(width: u32, height: u32, shift: f64) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let value = 128.0 + 60.0 * (0.35 * (x as f64 - shift)).sin() + 50.0 * (0.3 * y as f64).cos();
                let byte = quantize(value);
                data.extend_from_slice(&[byte, byte, byte, 255]);
            }
        }
        PixelBuffer::new(data, width, height).unwrap()
    }

    #[test]
    fn identical_frames_have_zero_flow() {
        let frame = textured(96, 96, 0.0);
        let result = OpticalFlowEstimator::default()
            .calculate(frame.view(), frame.view())
            .unwrap();
        assert_eq!(result.zones.len(), 25);
        assert!(result.zones.iter().all(|zone| zone.u == 0.0 && zone.v == 0.0));
        assert_eq!((result.u, result.v), (0.0, 0.0));
    }

    #[test]
    fn flat_frames_take_the_zero_norm_branch() {
        let flat = PixelBuffer::new(vec![90; 40 * 40 * 4], 40, 40).unwrap();
        let result = OpticalFlowEstimator::default().calculate(flat.view(), flat.view()).unwrap();
        assert_eq!(result.zones.len(), 4);
        assert_eq!((result.u, result.v), (0.0, 0.0));
    }

    #[test]
    fn horizontal_shift_recovers_positive_u() {
        let old = textured(96, 96, 0.0);
        let new = textured(96, 96, 1.0);
        let result = OpticalFlowEstimator::default().calculate(old.view(), new.view()).unwrap();

        assert!(result.zones.len() >= 20, "only {} zones accepted", result.zones.len());
        let positive = result.zones.iter().filter(|zone| zone.u > 0.0).count();
        assert!(positive * 10 >= result.zones.len() * 8, "{positive} of {} zones moved right", result.zones.len());
        assert!(result.u > 1.5 && result.u < 8.0, "mean u = {}", result.u);
        assert!(result.v.abs() < result.u / 2.0, "mean v = {} vs u = {}", result.v, result.u);
    }

    #[test]
    fn frames_too_small_for_a_window_are_empty() {
        let small = PixelBuffer::new(vec![0; 18 * 18 * 4], 18, 18).unwrap();
        let result = OpticalFlowEstimator::default().calculate(small.view(), small.view()).unwrap();
        assert!(result.is_empty());
        assert_eq!((result.u, result.v), (0.0, 0.0));

        let fits = PixelBuffer::new(vec![0; 19 * 19 * 4], 19, 19).unwrap();
        let result = OpticalFlowEstimator::default().calculate(fits.view(), fits.view()).unwrap();
        assert_eq!(result.zones.len(), 1);
        assert_eq!((result.zones[0].x, result.zones[0].y), (9, 9));
    }

    #[test]
    fn mismatched_frames_fail_fast() {
        let a = PixelBuffer::new(vec![0; 20 * 20 * 4], 20, 20).unwrap();
        let b = PixelBuffer::new(vec![0; 20 * 21 * 4], 20, 21).unwrap();
        let err = OpticalFlowEstimator::default().calculate(a.view(), b.view()).unwrap_err();
        assert!(matches!(err, VisionError::DimensionMismatch(_)));
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(OpticalFlowEstimator::new(0).is_err());
        assert_eq!(OpticalFlowEstimator::new(3).unwrap().window_span(), 7);
    }

    #[test]
    fn step_whose_span_overflows_is_rejected() {
        let err = OpticalFlowEstimator::new(1 << 31).unwrap_err();
        assert!(matches!(err, VisionError::InvalidParameter { name: "step", .. }));
        assert!(OpticalFlowEstimator::new(u32::MAX).is_err());
    }

    #[test]
    fn largest_step_yields_an_empty_field() {
        let estimator = OpticalFlowEstimator::new(MAX_STEP).unwrap();
        assert_eq!(estimator.window_span(), u32::MAX);
        let frame = textured(32, 32, 0.0);
        let result = estimator.calculate(frame.view(), frame.view()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn anchors_on_the_first_interior_ring_stay_in_bounds() {
        let estimator = OpticalFlowEstimator::new(2).unwrap();
        let frame = textured(7, 7, 0.0);
        // 7x7 with step 2 fits exactly one window, anchored at (3, 3).
        let sums = estimator.window_sums(&frame.view(), &frame.view(), 3, 3);
        assert!(sums.a2 > 0);
        assert_eq!((sums.c1, sums.c2), (0, 0));
        let zones = estimator.calculate(frame.view(), frame.view()).unwrap().zones;
        assert_eq!(zones.len(), 1);
        assert_eq!((zones[0].x, zones[0].y), (3, 3));
    }

    #[test]
    fn non_singular_system_uses_cramers_rule() {
        let sums = WindowSums { a2: 2, a1b2: 0, b1: 1, c1: 1, c2: 1 };
        assert_eq!(sums.solve(8), (-4.0, -8.0));
    }

    #[test]
    fn singular_system_falls_back_to_gradient_direction() {
        let sums = WindowSums { a2: 1, a1b2: 1, b1: 1, c1: 1, c2: 1 };
        assert_eq!(sums.solve(8), (-4.0, -4.0));
        assert_eq!(WindowSums::default().solve(8), (0.0, 0.0));
    }

    #[test]
    fn outliers_beyond_one_window_span_are_rejected() {
        let estimator = OpticalFlowEstimator::default();
        assert!(estimator.accepts(16.9, -16.9));
        assert!(!estimator.accepts(17.0, 0.0));
        assert!(!estimator.accepts(0.0, -17.0));
    }

    #[test]
    fn motion_summary_requires_non_zero_mean_on_both_axes() {
        let zones = vec![
            FlowZone { x: 9, y: 9, u: 6.0, v: 1.0 },
            FlowZone { x: 26, y: 9, u: 1.0, v: -1.0 },
            FlowZone { x: 43, y: 9, u: -2.0, v: -7.0 },
        ];
        let result = FlowResult::from_zones(zones.clone());
        let summary = result.motion_summary(5.0);
        assert_eq!(summary.count, 2);
        assert_eq!((summary.total_u, summary.total_v), (4.0, -6.0));

        let still = FlowResult::from_zones(vec![FlowZone { x: 9, y: 9, u: 6.0, v: 0.0 }]);
        assert_eq!(still.motion_summary(5.0), MotionSummary::default());
    }

    #[test]
    fn zone_colour_maps_velocity_onto_red_and_green() {
        let zone = FlowZone { x: 0, y: 0, u: -8.0, v: 8.0 };
        assert_eq!(zone_colour(&zone, 8), [0, 255, 128, 255]);
        let still = FlowZone { x: 0, y: 0, u: 0.0, v: 0.0 };
        assert_eq!(zone_colour(&still, 8), [128, 128, 128, 255]);
        let fast = FlowZone { x: 0, y: 0, u: 40.0, v: -40.0 };
        assert_eq!(zone_colour(&fast, 8), [255, 0, 128, 255]);
    }
}

// THEORY:
// A `Kernel` is a square grid of weights indexed by integer offsets from a centre
// element. The side is always odd, so the centre exists and offsets run from
// `-radius` to `+radius` on both axes.
//
// The webcam box blur averages a 6x6 block whose sample window runs from three
// pixels before the target to two pixels after it. That window is expressed here
// as a 7x7 kernel whose last row and column carry zero weight, which keeps the
// odd-side invariant and reproduces the same sums exactly.

use crate::error::{Result, VisionError};

/// Side of the uniform block the box blur averages over.
pub const BOX_BLUR_BLOCK: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    side: usize,
    /// Row-major weights: `weights[(dy + radius) * side + (dx + radius)]`.
    weights: Vec<f64>,
}

impl Kernel {
    pub fn new(side: usize, weights: Vec<f64>) -> Result<Self> {
        if side == 0 || side % 2 == 0 {
            return Err(VisionError::invalid("kernel side", format!("{side} must be odd and positive")));
        }
        if weights.len() != side * side {
            return Err(VisionError::invalid(
                "kernel weights",
                format!("expected {} weights for a {side}x{side} kernel, got {}", side * side, weights.len()),
            ));
        }
        Ok(Self { side, weights })
    }

    /// A `side` x `side` kernel with every weight `1 / side²`.
    #[cfg(test)]
    pub(crate) fn uniform(side: usize) -> Result<Self> {
        let weight = 1.0 / (side * side) as f64;
        Kernel::new(side, vec![weight; side * side])
    }

    /// The 6x6 uniform blur window (weights 1/36), sampling offsets -3..=2 on
    /// both axes.
    pub fn box_blur() -> Self {
        let block = BOX_BLUR_BLOCK;
        let side = block + 1;
        let weight = 1.0 / (block * block) as f64;
        let mut weights = vec![0.0; side * side];
        for row in 0..block {
            for col in 0..block {
                weights[row * side + col] = weight;
            }
        }
        Self { side, weights }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn radius(&self) -> i64 {
        (self.side / 2) as i64
    }

    #[cfg(test)]
    pub(crate) fn weight(&self, dx: i64, dy: i64) -> f64 {
        let radius = self.radius();
        if dx.abs() > radius || dy.abs() > radius {
            return 0.0;
        }
        self.weights[((dy + radius) as usize) * self.side + (dx + radius) as usize]
    }

    /// Every non-zero entry as `(dx, dy, weight)`.
    pub fn taps(&self) -> impl Iterator<Item = (i64, i64, f64)> + '_ {
        let radius = self.radius();
        let side = self.side;
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, weight)| **weight != 0.0)
            .map(move |(i, weight)| ((i % side) as i64 - radius, (i / side) as i64 - radius, *weight))
    }
}

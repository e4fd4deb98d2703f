// THEORY:
// A webcam can hand over the same frame twice when the capture loop runs faster
// than the camera. `same_frame` is a cheap strided probe that lets the flow
// tracker skip those duplicates instead of reporting a spurious zero field.
//
// Only raw byte positions `0, stride, 2 * stride, ...` below `sample_count` are
// compared, so the probe is a heuristic: two frames that differ only between
// the sampled bytes are reported as the same.

use crate::error::{Result, VisionError};

/// Default distance between compared bytes (one pixel).
pub const DEFAULT_STRIDE: usize = 4;

/// True when every sampled byte of `a` equals the same byte of `b`.
pub fn same_frame(a: &[u8], b: &[u8], stride: usize, sample_count: usize) -> Result<bool> {
    if stride == 0 {
        return Err(VisionError::invalid("stride", "must be positive"));
    }
    if sample_count > a.len() || sample_count > b.len() {
        return Err(VisionError::DimensionMismatch(format!(
            "cannot sample {sample_count} bytes from buffers of {} and {} bytes",
            a.len(),
            b.len()
        )));
    }

    Ok((0..sample_count).step_by(stride).all(|i| a[i] == b[i]))
}

//! This module provides the scalar building blocks shared by the filters and the picker: the
//! cosine-squared taper used to shape the wavenumber operator, amplitude maximum searches over
//! trace windows and the nearest-integer rounding used to project positions onto a receiver grid.

use ndarray::ArrayView1;
use num_traits::{Float, NumCast};
use std::f64::consts::FRAC_PI_2;

/// Computes the cosine-squared taper value for a given radius.
///
/// The taper is 1.0 below `inner`, 0.0 at and above `outer` and falls off as
/// `cos²(π/2 · (r - inner) / (outer - inner))` in between. With `inner == outer` the ramp
/// collapses to a step.
///
/// # Arguments
/// - `radius`: The radius at which the taper is evaluated.
/// - `inner`: Radius up to which the taper passes everything.
/// - `outer`: Radius from which on the taper rejects everything.
///
/// # Returns
/// The taper weight in the range [0.0, 1.0].
pub fn cos2_taper<T: Float>(radius: T, inner: T, outer: T) -> T {
    if radius < inner {
        T::one()
    } else if radius >= outer {
        T::zero()
    } else {
        let half_pi = <T as NumCast>::from(FRAC_PI_2).unwrap_or_else(T::one);
        let w = (half_pi * (radius - inner) / (outer - inner)).cos();
        w * w
    }
}

/// Finds the sample of maximum absolute amplitude in `trace[start..=end]`.
///
/// Ties keep the earliest sample. If the window contains only zeros, `start` is returned.
///
/// # Arguments
/// - `trace`: The trace to search.
/// - `start`: First sample of the search window.
/// - `end`: Last sample of the search window (inclusive).
pub fn argmax_abs(trace: ArrayView1<f32>, start: usize, end: usize) -> usize {
    debug_assert!(end < trace.len(), "search window ends outside the trace");
    let mut jmax = start;
    let mut tmax = 0.0_f32;
    for j in start..=end {
        let lmax = trace[j].abs();
        if lmax > tmax {
            jmax = j;
            tmax = lmax;
        }
    }
    jmax
}

/// Searches a window of `2 * half_width + 1` samples centred on `centre`, clamped to the trace.
pub fn argmax_abs_around(trace: ArrayView1<f32>, centre: usize, half_width: usize) -> usize {
    let last = trace.len().saturating_sub(1);
    let start = centre.saturating_sub(half_width).min(last);
    let end = centre.saturating_add(half_width).min(last);
    argmax_abs(trace, start, end)
}

/// Rounds to the nearest integer, halves away from zero.
pub fn nint(x: f32) -> i64 {
    x.round() as i64
}

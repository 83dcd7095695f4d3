//! Wavenumber domain filters for 2D trace grids.
//!
//! A trace grid is stored as an `Array2<f32>` of shape `(n2, n1)`: the fast axis `n1` runs
//! along each row, so the flat index of a sample is `slow * n1 + fast`.
//!
//! # Filter Implementations
//!
//! Filters do not own an FFT engine. They are handed a `SpectralTransform2D`, sized for the
//! grid, which performs the forward and inverse real-to-complex transforms.

/// Circular cosine-squared band filter used to mute dispersion.
pub mod dispersion;

/// The transform capability and the default realfft/rustfft backend.
pub mod transform;

use realfft::FftError;

/// Errors raised while building or applying a wavenumber filter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("inner radius {kl} is larger than outer radius {kh}")]
    InvertedBand { kl: f64, kh: f64 },

    #[error("filter radii must not be NaN (kl = {kl}, kh = {kh})")]
    InvalidBand { kl: f64, kh: f64 },

    #[error("sample spacing must be positive and finite, got {0}")]
    InvalidSpacing(f64),

    #[error("grid of {n1} x {n2} samples is too small, both axes need at least 2 samples")]
    GridTooSmall { n1: usize, n2: usize },

    #[error("array has shape {found:?} but the transform expects {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("FFT failed: {0}")]
    Fft(#[from] FftError),
}

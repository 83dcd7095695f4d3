//! The 2D real-to-complex transform pair the wavenumber filters run on.
//!
//! The spectrum of a grid of shape `(n2, n1)` has shape `(n2, n1 / 2 + 1)`: one-sided along the
//! fast axis, two-sided in wrap-around order along the slow axis.

use crate::filters::FilterError;
use ndarray::Array2;
use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// A forward/inverse 2D real FFT pair, planned for fixed extents.
///
/// Implementations define their own scale convention. Filters apply no normalization on top,
/// so a round trip through `forward` and `inverse` reproduces the input only up to that
/// convention.
pub trait SpectralTransform2D {
    /// Shape `(n2, n1)` of the space domain arrays.
    fn dim(&self) -> (usize, usize);

    /// Shape `(n2, n1 / 2 + 1)` of the spectra.
    fn spectrum_dim(&self) -> (usize, usize) {
        let (n2, n1) = self.dim();
        (n2, n1 / 2 + 1)
    }

    /// Transforms a real array into its one-sided spectrum.
    fn forward(&self, input: &Array2<f64>) -> Result<Array2<Complex64>, FilterError>;

    /// Transforms a one-sided spectrum back into a real array.
    fn inverse(&self, spectrum: Array2<Complex64>) -> Result<Array2<f64>, FilterError>;
}

/// Scaling applied by `RealFft2d::inverse`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Normalization {
    /// Inverse is scaled by `1 / (n1 * n2)`, a round trip is the identity.
    #[default]
    Inverse,
    /// Neither direction is scaled, a round trip multiplies by `n1 * n2`.
    None,
}

/// `SpectralTransform2D` backed by realfft along the fast axis and rustfft along the slow axis.
pub struct RealFft2d {
    n1: usize,
    n2: usize,
    normalization: Normalization,
    r2c: Arc<dyn RealToComplex<f64>>,
    c2r: Arc<dyn ComplexToReal<f64>>,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for RealFft2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFft2d")
            .field("n1", &self.n1)
            .field("n2", &self.n2)
            .field("normalization", &self.normalization)
            .finish()
    }
}

impl RealFft2d {
    /// Plans a normalized transform pair for arrays of `n2` rows of `n1` samples.
    pub fn new(n1: usize, n2: usize) -> Result<Self, FilterError> {
        Self::with_normalization(n1, n2, Normalization::Inverse)
    }

    pub fn with_normalization(
        n1: usize,
        n2: usize,
        normalization: Normalization,
    ) -> Result<Self, FilterError> {
        if n1 < 2 || n2 < 2 {
            return Err(FilterError::GridTooSmall { n1, n2 });
        }
        let mut real_planner = RealFftPlanner::<f64>::new();
        let mut planner = FftPlanner::<f64>::new();
        Ok(RealFft2d {
            n1,
            n2,
            normalization,
            r2c: real_planner.plan_fft_forward(n1),
            c2r: real_planner.plan_fft_inverse(n1),
            fft: planner.plan_fft_forward(n2),
            ifft: planner.plan_fft_inverse(n2),
        })
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    fn check_dim(expected: (usize, usize), found: (usize, usize)) -> Result<(), FilterError> {
        if expected != found {
            return Err(FilterError::ShapeMismatch { expected, found });
        }
        Ok(())
    }

    /// Runs `fft` over every column of `spectrum` in place.
    fn process_columns(fft: &dyn Fft<f64>, spectrum: &mut Array2<Complex64>) {
        let mut column = vec![Complex64::default(); spectrum.nrows()];
        let mut scratch = vec![Complex64::default(); fft.get_inplace_scratch_len()];
        for mut col in spectrum.columns_mut() {
            for (dst, src) in column.iter_mut().zip(col.iter()) {
                *dst = *src;
            }
            fft.process_with_scratch(&mut column, &mut scratch);
            for (dst, src) in col.iter_mut().zip(&column) {
                *dst = *src;
            }
        }
    }
}

impl SpectralTransform2D for RealFft2d {
    fn dim(&self) -> (usize, usize) {
        (self.n2, self.n1)
    }

    fn forward(&self, input: &Array2<f64>) -> Result<Array2<Complex64>, FilterError> {
        Self::check_dim(self.dim(), input.dim())?;

        let mut spectrum = Array2::<Complex64>::zeros(self.spectrum_dim());
        let mut row_in = self.r2c.make_input_vec();
        let mut row_out = self.r2c.make_output_vec();
        for (row, mut out) in input.rows().into_iter().zip(spectrum.rows_mut()) {
            for (dst, src) in row_in.iter_mut().zip(row.iter()) {
                *dst = *src;
            }
            self.r2c.process(&mut row_in, &mut row_out)?;
            for (dst, src) in out.iter_mut().zip(&row_out) {
                *dst = *src;
            }
        }

        Self::process_columns(self.fft.as_ref(), &mut spectrum);
        Ok(spectrum)
    }

    fn inverse(&self, mut spectrum: Array2<Complex64>) -> Result<Array2<f64>, FilterError> {
        Self::check_dim(self.spectrum_dim(), spectrum.dim())?;

        Self::process_columns(self.ifft.as_ref(), &mut spectrum);

        let mut output = Array2::<f64>::zeros(self.dim());
        let mut row_in = self.c2r.make_input_vec();
        let mut row_out = self.c2r.make_output_vec();
        let last = row_in.len() - 1;
        for (row, mut out) in spectrum.rows().into_iter().zip(output.rows_mut()) {
            for (dst, src) in row_in.iter_mut().zip(row.iter()) {
                *dst = *src;
            }
            // a real output has no imaginary part at zero and at the Nyquist bin
            row_in[0].im = 0.0;
            if self.n1 % 2 == 0 {
                row_in[last].im = 0.0;
            }
            self.c2r.process(&mut row_in, &mut row_out)?;
            for (dst, src) in out.iter_mut().zip(&row_out) {
                *dst = *src;
            }
        }

        if self.normalization == Normalization::Inverse {
            let scale = 1.0 / (self.n1 * self.n2) as f64;
            output.mapv_inplace(|v| v * scale);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(n1: usize, n2: usize) -> Array2<f64> {
        Array2::from_shape_fn((n2, n1), |(i2, i1)| ((i2 * n1 + i1) as f64 * 0.37).sin())
    }

    #[test]
    fn test_roundtrip_even_and_odd_extents() {
        for &(n1, n2) in &[(16, 8), (15, 9), (8, 7), (2, 2)] {
            let transform = RealFft2d::new(n1, n2).unwrap();
            let input = ramp(n1, n2);
            let spectrum = transform.forward(&input).unwrap();
            assert_eq!(spectrum.dim(), (n2, n1 / 2 + 1));
            let output = transform.inverse(spectrum).unwrap();
            for (a, b) in input.iter().zip(output.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_unnormalized_roundtrip_scales_by_size() {
        let transform = RealFft2d::with_normalization(12, 6, Normalization::None).unwrap();
        let input = ramp(12, 6);
        let output = transform.inverse(transform.forward(&input).unwrap()).unwrap();
        for (a, b) in input.iter().zip(output.iter()) {
            assert_abs_diff_eq!(a * 72.0, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_dc_component() {
        let (n1, n2) = (8, 4);
        let transform = RealFft2d::new(n1, n2).unwrap();
        let spectrum = transform.forward(&Array2::from_elem((n2, n1), 3.0)).unwrap();
        assert_abs_diff_eq!(spectrum[[0, 0]].re, 96.0, epsilon = 1e-10);
        assert_abs_diff_eq!(spectrum[[0, 0]].im, 0.0, epsilon = 1e-10);
        let rest: f64 = spectrum.iter().skip(1).map(|c| c.norm()).sum();
        assert_abs_diff_eq!(rest, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        let transform = RealFft2d::new(8, 4).unwrap();
        let result = transform.forward(&Array2::zeros((8, 4)));
        assert!(matches!(result, Err(FilterError::ShapeMismatch { .. })));
        assert!(matches!(
            RealFft2d::new(1, 4),
            Err(FilterError::GridTooSmall { n1: 1, n2: 4 })
        ));
    }
}

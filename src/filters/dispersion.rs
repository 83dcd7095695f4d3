//! Circular wavenumber filter for muting numerical dispersion.
//!
//! Dispersion is muted by applying a circular cosine-squared tapered filter around the origin
//! of the wavenumber domain. The taper is 1 up to `kl`, after which it decays according to the
//! cosine squared to 0 at `kh`.
//!
//! The wavenumber step along an axis of `N` samples with spacing `d` is `2π / (N d)` for even
//! `N` and `2π / ((N - 1) d)` for odd `N`. With `M = N / 2`, only bins whose signed index has a
//! magnitude below `M` are populated: the Nyquist bin of an even axis, and the `±π / d` bins of
//! an odd axis, are always muted.

use crate::config::DispersionSettings;
use crate::filters::transform::SpectralTransform2D;
use crate::filters::FilterError;
use crate::math_tools::cos2_taper;
use ndarray::{Array2, ArrayView2, Zip};
use std::f64::consts::TAU;

/// Wavenumber step of an axis with `n` samples spaced `d` apart.
pub fn wavenumber_step(n: usize, d: f64) -> f64 {
    if n % 2 == 0 {
        TAU / (n as f64 * d)
    } else {
        TAU / ((n - 1) as f64 * d)
    }
}

/// Index of the bin holding the negated wavenumber of bin `i` on a two-sided axis of `n` bins.
pub fn mirror_index(i: usize, n: usize) -> usize {
    debug_assert!(i < n, "bin {i} outside an axis of {n} bins");
    (n - i) % n
}

/// The wavenumbers of a `(n2, n1)` grid.
///
/// # Fields
/// - `k1`: Populated fast axis wavenumbers `0, dk1, 2 dk1, ...`; the spectrum holds one more
///   bin which is always muted.
/// - `k2`: Slow axis wavenumbers in wrap-around order, `None` for muted bins.
#[derive(Clone, Debug, PartialEq)]
pub struct WavenumberGrid {
    n1: usize,
    n2: usize,
    k1: Vec<f64>,
    k2: Vec<Option<f64>>,
}

impl WavenumberGrid {
    pub fn new(n1: usize, n2: usize, d: f64) -> Result<Self, FilterError> {
        if n1 < 2 || n2 < 2 {
            return Err(FilterError::GridTooSmall { n1, n2 });
        }
        if !(d.is_finite() && d > 0.0) {
            return Err(FilterError::InvalidSpacing(d));
        }

        let nk1 = n1 / 2;
        let dk1 = wavenumber_step(n1, d);
        let k1 = (0..nk1).map(|i1| i1 as f64 * dk1).collect();

        // positive half first, then the negative half mirrored from it in reverse order
        let nk2p = n2 / 2;
        let dk2 = wavenumber_step(n2, d);
        let mut k2 = vec![None; n2];
        for (i2, k) in k2.iter_mut().enumerate().take(nk2p) {
            *k = Some(i2 as f64 * dk2);
        }
        for i2 in 1..nk2p {
            k2[mirror_index(i2, n2)] = k2[i2].map(|k| -k);
        }

        Ok(WavenumberGrid { n1, n2, k1, k2 })
    }

    /// Shape `(n2, n1 / 2 + 1)` of the spectrum this grid describes.
    pub fn spectrum_dim(&self) -> (usize, usize) {
        (self.n2, self.n1 / 2 + 1)
    }

    pub fn k1(&self) -> &[f64] {
        &self.k1
    }

    pub fn k2(&self) -> &[Option<f64>] {
        &self.k2
    }

    /// Radius of the cell `(i2, i1)`, `None` if the cell is muted.
    pub fn radius(&self, i2: usize, i1: usize) -> Option<f64> {
        let k1 = *self.k1.get(i1)?;
        let k2 = (*self.k2.get(i2)?)?;
        Some(k1.hypot(k2))
    }
}

/// The circular dispersion filter with validated parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DispersionFilter {
    d: f64,
    kl: f64,
    kh: f64,
}

impl DispersionFilter {
    /// # Arguments
    /// * `d` - Spatial step size for both dimensions
    /// * `kl` - Inner radius, or start, of the wavenumber taper
    /// * `kh` - Outer radius, or end, of the wavenumber taper
    pub fn new(d: f64, kl: f64, kh: f64) -> Result<Self, FilterError> {
        if !(d.is_finite() && d > 0.0) {
            return Err(FilterError::InvalidSpacing(d));
        }
        if kl.is_nan() || kh.is_nan() {
            return Err(FilterError::InvalidBand { kl, kh });
        }
        if kl > kh {
            return Err(FilterError::InvertedBand { kl, kh });
        }
        Ok(DispersionFilter { d, kl, kh })
    }

    pub fn from_settings(settings: &DispersionSettings) -> Result<Self, FilterError> {
        Self::new(settings.d, settings.kl, settings.kh)
    }

    pub fn d(&self) -> f64 {
        self.d
    }

    pub fn kl(&self) -> f64 {
        self.kl
    }

    pub fn kh(&self) -> f64 {
        self.kh
    }

    /// Builds the real valued taper operator for a `(n2, n1)` grid.
    ///
    /// Rows of negative slow wavenumbers are copies of their positive mirror rows, so
    /// `op[[i, ..]] == op[[n2 - i, ..]]` holds exactly.
    pub fn operator(&self, n1: usize, n2: usize) -> Result<Array2<f64>, FilterError> {
        let grid = WavenumberGrid::new(n1, n2, self.d)?;
        let mut op = Array2::<f64>::zeros(grid.spectrum_dim());

        let nk2p = n2 / 2;
        for i2 in 0..nk2p {
            for i1 in 0..grid.k1.len() {
                if let Some(k) = grid.radius(i2, i1) {
                    op[[i2, i1]] = cos2_taper(k, self.kl, self.kh);
                }
            }
        }
        for i2 in (nk2p + 1)..n2 {
            if grid.k2[i2].is_none() {
                continue;
            }
            let mirrored = op.row(mirror_index(i2, n2)).to_owned();
            op.row_mut(i2).assign(&mirrored);
        }
        Ok(op)
    }

    /// Filters a space domain array of shape `(n2, n1)` and returns the result.
    pub fn apply<T>(&self, input: ArrayView2<f32>, transform: &T) -> Result<Array2<f32>, FilterError>
    where
        T: SpectralTransform2D + ?Sized,
    {
        let (n2, n1) = input.dim();
        if transform.dim() != (n2, n1) {
            return Err(FilterError::ShapeMismatch {
                expected: transform.dim(),
                found: (n2, n1),
            });
        }
        let op = self.operator(n1, n2)?;

        let mut spectrum = transform.forward(&input.mapv(f64::from))?;
        if spectrum.dim() != op.dim() {
            return Err(FilterError::ShapeMismatch {
                expected: op.dim(),
                found: spectrum.dim(),
            });
        }
        Zip::from(&mut spectrum).and(&op).for_each(|c, &w| *c *= w);
        let output = transform.inverse(spectrum)?;

        log::trace!(
            "applied dispersion filter kl={} kh={} to {} x {} grid",
            self.kl,
            self.kh,
            n1,
            n2
        );
        Ok(output.mapv(|v| v as f32))
    }

    /// Filters `data` in place.
    pub fn apply_in_place<T>(&self, data: &mut Array2<f32>, transform: &T) -> Result<(), FilterError>
    where
        T: SpectralTransform2D + ?Sized,
    {
        let filtered = self.apply(data.view(), transform)?;
        data.assign(&filtered);
        Ok(())
    }
}

/// Applies the circular dispersion filter with inner radius `kl` and outer radius `kh`.
pub fn k1k2_circular_filter<T>(
    input: ArrayView2<f32>,
    d: f64,
    kl: f64,
    kh: f64,
    transform: &T,
) -> Result<Array2<f32>, FilterError>
where
    T: SpectralTransform2D + ?Sized,
{
    DispersionFilter::new(d, kl, kh)?.apply(input, transform)
}

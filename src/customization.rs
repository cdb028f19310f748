//! Customization matrices: the data side of the least-squares problem.
//!
//! For each frequency bin the ideal target response is compared against the
//! real-time filter's transfer function evaluated through the spectral
//! density of the explanatory series. Flattening the transfer function over
//! lags and series yields two dense real design matrices (`REX` for the
//! real part, `IMX` for the imaginary part, each `(K+1) × (nseries·L)`) and
//! a target weight vector `rh_gamma` of length `K+1`.

use crate::error::{Error, Result};
use crate::types::MdfaParameters;
use crate::weightings::{SmoothingSpec, TargetSpec};
use ndarray::{Array1, Array2};
use num_complex::Complex;
use num_traits::{Float, FloatConst};

/// The assembled data-side matrices.
///
/// Column block `i` (columns `i·L .. (i+1)·L`) holds the frequency-domain
/// contribution of series `i`'s coefficients at lags `0..L`. The struct is
/// refilled in place by [`build_into`] when only parameter values changed,
/// and reallocated when a dimension-changing parameter forces a new shape.
#[derive(Debug, Clone)]
pub struct CustomizationMatrices<T> {
    /// Real part of the weighted transfer-function design matrix.
    pub rex: Array2<T>,
    /// Imaginary part, additionally scaled by the filter-speed weight.
    pub imx: Array2<T>,
    /// Target weight vector: ideal response times target spectral
    /// magnitude.
    pub rh_gamma: Array1<T>,
}

impl<T: Float> CustomizationMatrices<T> {
    /// Creates zeroed matrices for `num_bins + 1` frequency rows and
    /// `coefficient_len` columns.
    pub fn zeros(num_bins: usize, coefficient_len: usize) -> CustomizationMatrices<T> {
        CustomizationMatrices {
            rex: Array2::zeros((num_bins + 1, coefficient_len)),
            imx: Array2::zeros((num_bins + 1, coefficient_len)),
            rh_gamma: Array1::zeros(num_bins + 1),
        }
    }

    /// Makes the matrices match the given shape: reallocates when the shape
    /// changed, zeroes the existing storage otherwise.
    pub fn reset(&mut self, num_bins: usize, coefficient_len: usize) {
        if self.rex.dim() != (num_bins + 1, coefficient_len) {
            *self = CustomizationMatrices::zeros(num_bins, coefficient_len);
        } else {
            self.rex.fill(T::zero());
            self.imx.fill(T::zero());
            self.rh_gamma.fill(T::zero());
        }
    }
}

/// Builds the customization matrices into existing storage.
///
/// `snapshots` holds one spectral snapshot per explanatory series and
/// `target_snapshot` the snapshot of the target series; all must span
/// `K + 1` bins for `K = floor(n / 2)`. Fails with
/// [`Error::SeriesCountMismatch`] when the snapshot count differs from the
/// configured series count and with [`Error::InvalidDimension`] when a
/// snapshot has the wrong bin count.
pub fn build_into<T: Float + FloatConst>(
    matrices: &mut CustomizationMatrices<T>,
    params: &MdfaParameters<T>,
    snapshots: &[Vec<Complex<T>>],
    target_snapshot: &[Complex<T>],
    target: &TargetSpec<T>,
    smoothing: &SmoothingSpec<T>,
) -> Result<()> {
    let num_bins = params.num_bins();
    let filter_length = params.filter_length();
    let nseries = params.nseries();
    if snapshots.len() != nseries {
        return Err(Error::SeriesCountMismatch {
            expected: nseries,
            actual: snapshots.len(),
        });
    }
    for len in snapshots
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(target_snapshot.len()))
    {
        if len != num_bins + 1 {
            return Err(Error::InvalidDimension(format!(
                "spectral snapshot has {} bins, window of {} observations needs {}",
                len,
                params.insample_length(),
                num_bins + 1
            )));
        }
    }
    matrices.reset(num_bins, params.coefficient_len());

    let lag = params.lag();
    let lambda = params.lambda();
    let bin_step = T::PI() / T::from(num_bins).unwrap();
    for j in 0..=num_bins {
        let gamma = target.sample(j, num_bins);
        let weight = smoothing.sample(j, num_bins);
        let target_bin = target_snapshot[j];
        matrices.rh_gamma[j] = gamma * target_bin.norm();
        // rotate every series into the target's phase so only the relative
        // phase (the time shift) enters the fit
        let align = Complex::from_polar(T::one(), -target_bin.arg());
        let lambda_weight = (T::one() + gamma * lambda).sqrt();
        let omega = T::from(j).unwrap() * bin_step;
        for (i, snapshot) in snapshots.iter().enumerate() {
            let weighted = snapshot[j].scale(weight) * align;
            for l in 0..filter_length {
                let phase = (T::from(l).unwrap() - lag) * omega;
                let base = Complex::from_polar(T::one(), phase) * weighted;
                let col = i * filter_length + l;
                matrices.rex[[j, col]] = base.re;
                matrices.imx[[j, col]] = lambda_weight * base.im;
            }
        }
    }
    Ok(())
}

/// Builds the customization matrices into fresh storage.
pub fn build<T: Float + FloatConst>(
    params: &MdfaParameters<T>,
    snapshots: &[Vec<Complex<T>>],
    target_snapshot: &[Complex<T>],
    target: &TargetSpec<T>,
    smoothing: &SmoothingSpec<T>,
) -> Result<CustomizationMatrices<T>> {
    let mut matrices = CustomizationMatrices::zeros(params.num_bins(), params.coefficient_len());
    build_into(
        &mut matrices,
        params,
        snapshots,
        target_snapshot,
        target,
        smoothing,
    )?;
    Ok(matrices)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectral::{SeriesWindow, spectral_snapshot_tail};

    fn snapshot_of(data: &[f64], n: usize) -> Vec<Complex<f64>> {
        spectral_snapshot_tail(&SeriesWindow::new(data), n).unwrap()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|t| ((t as f64) * 0.7).sin()).collect()
    }

    #[test]
    fn shapes_follow_parameters() {
        let params = MdfaParameters::<f64>::new(60, 8, 2).unwrap();
        let data = ramp(60);
        let snapshot = snapshot_of(&data, 60);
        let matrices = build(
            &params,
            &[snapshot.clone(), snapshot.clone()],
            &snapshot,
            &TargetSpec::from_parameters(&params),
            &SmoothingSpec::from_parameters(&params),
        )
        .unwrap();
        assert_eq!(matrices.rex.dim(), (31, 16));
        assert_eq!(matrices.imx.dim(), (31, 16));
        assert_eq!(matrices.rh_gamma.len(), 31);
    }

    #[test]
    fn snapshot_count_must_match() {
        let params = MdfaParameters::<f64>::new(60, 8, 2).unwrap();
        let data = ramp(60);
        let snapshot = snapshot_of(&data, 60);
        let result = build(
            &params,
            &[snapshot.clone()],
            &snapshot,
            &TargetSpec::from_parameters(&params),
            &SmoothingSpec::from_parameters(&params),
        );
        assert!(matches!(
            result,
            Err(Error::SeriesCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn target_vector_vanishes_in_stopband() {
        let mut params = MdfaParameters::<f64>::new(40, 5, 1).unwrap();
        params.set_lowpass_cutoff(0.5);
        let data = ramp(40);
        let snapshot = snapshot_of(&data, 40);
        let matrices = build(
            &params,
            &[snapshot.clone()],
            &snapshot,
            &TargetSpec::from_parameters(&params),
            &SmoothingSpec::from_parameters(&params),
        )
        .unwrap();
        let num_bins = params.num_bins();
        for j in 0..=num_bins {
            let omega = std::f64::consts::PI * j as f64 / num_bins as f64;
            if omega > 0.5 {
                assert_eq!(matrices.rh_gamma[j], 0.0);
            }
        }
    }

    #[test]
    fn refill_preserves_allocation_shape() {
        let mut params = MdfaParameters::<f64>::new(60, 8, 1).unwrap();
        let data = ramp(60);
        let snapshot = snapshot_of(&data, 60);
        let target = TargetSpec::from_parameters(&params);
        let smoothing = SmoothingSpec::from_parameters(&params);
        let mut matrices = build(&params, &[snapshot.clone()], &snapshot, &target, &smoothing).unwrap();
        let before = matrices.rex.clone();
        params.set_lag(2.0);
        build_into(
            &mut matrices,
            &params,
            &[snapshot.clone()],
            &snapshot,
            &target,
            &smoothing,
        )
        .unwrap();
        assert_eq!(matrices.rex.dim(), before.dim());
        assert!(matrices.rex != before);
    }
}

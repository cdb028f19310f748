//! Frequency-domain estimation of input series.
//!
//! This module contains the classical discrete-Fourier-transform estimator
//! that turns a stationary series window into the complex spectral snapshot
//! consumed by the customization builder. Snapshots span the `K + 1`
//! non-negative frequency bins `ω_j = π·j/K`, `K = floor(len / 2)`, and are
//! rebuilt from scratch for every new window; they are never mutated in
//! place.

use crate::error::{Error, Result};
use num_complex::Complex;
use num_traits::{Float, FloatConst};

/// A borrowed window of one input series.
///
/// The raw values are assumed to be already stationarity-transformed by the
/// caller (differencing and log transforms are an external concern). A
/// series may additionally carry a pre-filtered copy of itself; when
/// present, the spectral estimator reads the pre-filtered values instead of
/// the raw ones, while downstream consumers (the causal convolution) keep
/// using the raw values.
#[derive(Debug, Copy, Clone)]
pub struct SeriesWindow<'a, T> {
    values: &'a [T],
    prefiltered: Option<&'a [T]>,
}

impl<'a, T: Copy> SeriesWindow<'a, T> {
    /// Creates a window over raw series values.
    pub fn new(values: &'a [T]) -> SeriesWindow<'a, T> {
        SeriesWindow {
            values,
            prefiltered: None,
        }
    }

    /// Creates a window whose spectral content is taken from a pre-filtered
    /// copy of the series.
    ///
    /// The two slices must have the same length.
    pub fn with_prefilter(values: &'a [T], prefiltered: &'a [T]) -> Result<SeriesWindow<'a, T>> {
        if values.len() != prefiltered.len() {
            return Err(Error::InvalidDimension(format!(
                "pre-filtered copy has {} observations, series has {}",
                prefiltered.len(),
                values.len()
            )));
        }
        Ok(SeriesWindow {
            values,
            prefiltered: Some(prefiltered),
        })
    }

    /// Returns the number of observations in the window.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the window holds no observations.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value the spectral estimator should read at position `i`.
    pub fn sample(&self, i: usize) -> T {
        match self.prefiltered {
            Some(pre) => pre[i],
            None => self.values[i],
        }
    }
}

/// Computes the spectral snapshot of `len` observations starting at
/// `start`.
///
/// The snapshot holds `K + 1 = floor(len / 2) + 1` complex bins. Bin 0 is
/// the window mean over the normalizer `sqrt(π·len)` (purely real); bin `j`
/// for `1 <= j <= K` accumulates
/// `Σ_i x[start + i] · exp(i·π·(i + 1)·j/K)` divided by the same
/// normalizer.
///
/// Fails with [`Error::InsufficientData`] if the series does not hold
/// `start + len` observations, and with [`Error::InvalidDimension`] for a
/// window shorter than two observations.
pub fn spectral_snapshot<T: Float + FloatConst>(
    series: &SeriesWindow<'_, T>,
    start: usize,
    len: usize,
) -> Result<Vec<Complex<T>>> {
    if len < 2 {
        return Err(Error::InvalidDimension(format!(
            "spectral window of {len} observations has no resolvable frequencies"
        )));
    }
    if series.len() < start + len {
        return Err(Error::InsufficientData {
            needed: start + len,
            available: series.len(),
        });
    }
    let num_bins = len / 2;
    let normalizer = (T::PI() * T::from(len).unwrap()).sqrt().recip();
    let mut snapshot = Vec::with_capacity(num_bins + 1);

    let mut mean = T::zero();
    for i in 0..len {
        mean = mean + series.sample(start + i);
    }
    mean = mean / T::from(len).unwrap();
    snapshot.push(Complex::new(mean * normalizer, T::zero()));

    let bin_step = T::PI() / T::from(num_bins).unwrap();
    for j in 1..=num_bins {
        let omega = T::from(j).unwrap() * bin_step;
        let mut acc = Complex::new(T::zero(), T::zero());
        for i in 0..len {
            let angle = T::from(i + 1).unwrap() * omega;
            acc = acc + Complex::from_polar(series.sample(start + i), angle);
        }
        snapshot.push(acc.scale(normalizer));
    }
    Ok(snapshot)
}

/// Computes the spectral snapshot of the last `len` observations of a
/// series.
///
/// This is the form used by the solve pipeline, which always reads the
/// in-sample window from the tail of the supplied data.
pub fn spectral_snapshot_tail<T: Float + FloatConst>(
    series: &SeriesWindow<'_, T>,
    len: usize,
) -> Result<Vec<Complex<T>>> {
    if series.len() < len {
        return Err(Error::InsufficientData {
            needed: len,
            available: series.len(),
        });
    }
    spectral_snapshot(series, series.len() - len, len)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn rejects_short_series() {
        let data = [1.0; 8];
        let window = SeriesWindow::new(&data);
        assert!(matches!(
            spectral_snapshot_tail(&window, 16),
            Err(Error::InsufficientData {
                needed: 16,
                available: 8
            })
        ));
    }

    #[test]
    fn bin_zero_is_scaled_mean() {
        let data = [2.0; 20];
        let window = SeriesWindow::new(&data);
        let snapshot = spectral_snapshot_tail(&window, 20).unwrap();
        assert_eq!(snapshot.len(), 11);
        let expected = 2.0 / (PI * 20.0).sqrt();
        assert!((snapshot[0].re - expected).abs() < 1e-12);
        assert_eq!(snapshot[0].im, 0.0);
    }

    #[test]
    fn prefiltered_values_take_precedence() {
        let raw = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let pre = [0.0; 10];
        let window = SeriesWindow::with_prefilter(&raw, &pre).unwrap();
        let snapshot = spectral_snapshot_tail(&window, 10).unwrap();
        for bin in snapshot {
            assert_eq!(bin.norm(), 0.0);
        }
    }

    #[test]
    fn single_sinusoid_concentrates_at_its_bin() {
        // 64 samples of cos(ω_8·t) should put most spectral mass at bin 8.
        let len = 64;
        let k = len / 2;
        let omega = PI * 8.0 / k as f64;
        let data: Vec<f64> = (0..len).map(|t| (omega * t as f64).cos()).collect();
        let window = SeriesWindow::new(&data);
        let snapshot = spectral_snapshot_tail(&window, len).unwrap();
        let peak = snapshot
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.norm().partial_cmp(&b.norm()).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, 8);
    }
}

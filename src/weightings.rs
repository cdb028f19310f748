//! Target filter and smoothing weight definitions.
//!
//! The customization builder weights the spectral density of every series
//! with a [`SmoothingSpec`] and multiplies the target spectral density with
//! a [`TargetSpec`], the ideal (symmetric, non-causal) frequency response
//! that the real-time filter approximates. Both are evaluated per frequency
//! bin `ω_j = π·j/K`, and both can be defined as arbitrary functions in
//! addition to the built-in shapes.

use crate::error::{Error, Result};
use num_traits::{Float, FloatConst};

/// Ideal target frequency response.
///
/// Values of this object are constructed using [`TargetSpec::lowpass`],
/// [`TargetSpec::bandpass`] and [`TargetSpec::function`]. The built-in
/// shapes are pass-band indicators: one inside the band, zero outside.
#[derive(Debug)]
pub struct TargetSpec<T>(TargetData<T>);

enum TargetData<T> {
    Lowpass { cutoff: T },
    Bandpass { low: T, high: T },
    Function { f: Box<dyn Fn(T) -> T> },
}

impl<T: Float + FloatConst> TargetSpec<T> {
    /// Creates an ideal low-pass indicator with the given cutoff in
    /// radians.
    pub fn lowpass(cutoff: T) -> TargetSpec<T> {
        TargetSpec(TargetData::Lowpass { cutoff })
    }

    /// Creates an ideal band-pass indicator for the band `[low, high]` in
    /// radians.
    pub fn bandpass(low: T, high: T) -> Result<TargetSpec<T>> {
        if low > high {
            return Err(Error::InvalidDimension(
                "band-pass edges are in the wrong order".to_string(),
            ));
        }
        Ok(TargetSpec(TargetData::Bandpass { low, high }))
    }

    /// Creates a target response defined by an arbitrary function of the
    /// frequency in radians.
    pub fn function(f: Box<dyn Fn(T) -> T>) -> TargetSpec<T> {
        TargetSpec(TargetData::Function { f })
    }

    /// Builds the indicator matching a parameter set: band-pass when the
    /// lower edge is positive, low-pass otherwise.
    pub fn from_parameters(params: &crate::types::MdfaParameters<T>) -> TargetSpec<T> {
        if params.bandpass_cutoff() > T::zero() {
            TargetSpec(TargetData::Bandpass {
                low: params.bandpass_cutoff(),
                high: params.lowpass_cutoff(),
            })
        } else {
            TargetSpec::lowpass(params.lowpass_cutoff())
        }
    }

    /// Evaluates the target response at a frequency in radians.
    pub fn value(&self, omega: T) -> T {
        match &self.0 {
            TargetData::Lowpass { cutoff } => {
                if omega <= *cutoff {
                    T::one()
                } else {
                    T::zero()
                }
            }
            TargetData::Bandpass { low, high } => {
                if (*low..=*high).contains(&omega) {
                    T::one()
                } else {
                    T::zero()
                }
            }
            TargetData::Function { f } => (f)(omega),
        }
    }

    /// Evaluates the target response at bin `j` of `num_bins`,
    /// `ω_j = π·j/num_bins`.
    pub fn sample(&self, j: usize, num_bins: usize) -> T {
        self.value(T::PI() * T::from(j).unwrap() / T::from(num_bins).unwrap())
    }
}

/// Frequency-domain smoothing weight.
///
/// The weight multiplies each series' spectral density before the
/// least-squares matrices are assembled, emphasizing stop-band fit at the
/// expense of pass-band fit. Values are constructed using
/// [`SmoothingSpec::unit`], [`SmoothingSpec::exponential`] and
/// [`SmoothingSpec::function`].
#[derive(Debug)]
pub struct SmoothingSpec<T>(SmoothingData<T>);

enum SmoothingData<T> {
    Unit,
    Exponential { cutoff: T, alpha: T },
    Function { f: Box<dyn Fn(T) -> T> },
}

impl<T: Float + FloatConst> SmoothingSpec<T> {
    /// Creates the neutral weight, one at every frequency.
    pub fn unit() -> SmoothingSpec<T> {
        SmoothingSpec(SmoothingData::Unit)
    }

    /// Creates an exponential stop-band profile: one up to the cutoff,
    /// `(1 + ω - cutoff)^(alpha/2)` beyond it.
    pub fn exponential(cutoff: T, alpha: T) -> SmoothingSpec<T> {
        SmoothingSpec(SmoothingData::Exponential { cutoff, alpha })
    }

    /// Creates a weight defined by an arbitrary function of the frequency
    /// in radians.
    pub fn function(f: Box<dyn Fn(T) -> T>) -> SmoothingSpec<T> {
        SmoothingSpec(SmoothingData::Function { f })
    }

    /// Builds the weight matching a parameter set: an exponential stop-band
    /// profile above the low-pass cutoff when `alpha` is positive, the
    /// neutral weight otherwise.
    pub fn from_parameters(params: &crate::types::MdfaParameters<T>) -> SmoothingSpec<T> {
        if params.alpha() > T::zero() {
            SmoothingSpec::exponential(params.lowpass_cutoff(), params.alpha())
        } else {
            SmoothingSpec::unit()
        }
    }

    /// Evaluates the weight at a frequency in radians.
    pub fn value(&self, omega: T) -> T {
        match &self.0 {
            SmoothingData::Unit => T::one(),
            SmoothingData::Exponential { cutoff, alpha } => {
                if omega <= *cutoff {
                    T::one()
                } else {
                    let half = T::from(0.5).unwrap();
                    (T::one() + omega - *cutoff).powf(*alpha * half)
                }
            }
            SmoothingData::Function { f } => (f)(omega),
        }
    }

    /// Evaluates the weight at bin `j` of `num_bins`,
    /// `ω_j = π·j/num_bins`.
    pub fn sample(&self, j: usize, num_bins: usize) -> T {
        self.value(T::PI() * T::from(j).unwrap() / T::from(num_bins).unwrap())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for TargetData<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            TargetData::Lowpass { cutoff } => {
                f.debug_struct("Lowpass").field("cutoff", cutoff).finish()
            }
            TargetData::Bandpass { low, high } => f
                .debug_struct("Bandpass")
                .field("low", low)
                .field("high", high)
                .finish(),
            TargetData::Function { .. } => f.debug_struct("Function").finish(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SmoothingData<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            SmoothingData::Unit => f.debug_struct("Unit").finish(),
            SmoothingData::Exponential { cutoff, alpha } => f
                .debug_struct("Exponential")
                .field("cutoff", cutoff)
                .field("alpha", alpha)
                .finish(),
            SmoothingData::Function { .. } => f.debug_struct("Function").finish(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::MdfaParameters;
    use std::f64::consts::PI;

    #[test]
    fn lowpass_indicator() {
        let target = TargetSpec::lowpass(0.5);
        assert_eq!(target.value(0.0), 1.0);
        assert_eq!(target.value(0.5), 1.0);
        assert_eq!(target.value(0.51), 0.0);
    }

    #[test]
    fn bandpass_indicator() {
        let target = TargetSpec::bandpass(0.3, 1.2).unwrap();
        assert_eq!(target.value(0.1), 0.0);
        assert_eq!(target.value(0.7), 1.0);
        assert_eq!(target.value(2.0), 0.0);
        assert!(TargetSpec::<f64>::bandpass(1.2, 0.3).is_err());
    }

    #[test]
    fn exponential_stopband_grows_past_cutoff() {
        let weight = SmoothingSpec::exponential(PI / 6.0, 10.0);
        assert_eq!(weight.value(0.1), 1.0);
        let a = weight.value(PI / 4.0);
        let b = weight.value(PI / 2.0);
        assert!(a > 1.0);
        assert!(b > a);
    }

    #[test]
    fn parameter_defaults() {
        let mut params = MdfaParameters::<f64>::new(100, 10, 1).unwrap();
        params.set_bandpass_cutoff(0.2).set_alpha(5.0);
        let target = TargetSpec::from_parameters(&params);
        assert_eq!(target.value(0.1), 0.0);
        assert_eq!(target.value(0.3), 1.0);
        let weight = SmoothingSpec::from_parameters(&params);
        assert!(weight.value(PI) > 1.0);
    }
}

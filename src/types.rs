use crate::error::{Error, Result};
use num_traits::{Float, FloatConst};

/// MDFA hyperparameter set.
///
/// This struct holds every scalar hyperparameter consumed by the matrix
/// builders and the solver: the in-sample window length, the filter length,
/// the number of explanatory series, the lag (negative for forecasting,
/// positive for smoothing), the pass-band definition, the customization
/// weights (`alpha`, `lambda`), the regularization weights (`smooth`,
/// `decay_strength`, `decay_start`, `cross_corr`), and the boundary
/// constraint flags (`i1`, `i2`) with their shift value.
///
/// The type parameter `T` is the scalar type used for computation. Typically
/// it should implement the [`Float`] and [`FloatConst`] traits.
///
/// Mutation happens through setters that clamp out-of-range values instead
/// of rejecting them. Each setter records whether it changed a parameter
/// that alters matrix *dimensions* (`n`, `filter_length`, `nseries`, `i1`,
/// `i2`) or only matrix *values* (everything else). The two version counters
/// returned by [`dimension_version`](Self::dimension_version) and
/// [`value_version`](Self::value_version) let dependent builders decide
/// between a full reallocation and an in-place refill.
#[derive(Debug, Clone)]
pub struct MdfaParameters<T> {
    n: usize,
    filter_length: usize,
    nseries: usize,
    lag: T,
    lowpass_cutoff: T,
    bandpass_cutoff: T,
    alpha: T,
    lambda: T,
    smooth: T,
    decay_strength: T,
    decay_start: T,
    cross_corr: T,
    shift_constraint: T,
    i1: bool,
    i2: bool,
    dimension_version: u64,
    value_version: u64,
}

fn clamp_window(n: usize) -> usize {
    n.clamp(10, 1000)
}

fn clamp_filter_length(len: usize, n: usize) -> usize {
    len.clamp(2, n.saturating_sub(10).max(2))
}

impl<T: Float + FloatConst> MdfaParameters<T> {
    /// Creates a new parameter set.
    ///
    /// `n` is the in-sample window length (clamped to `[10, 1000]`),
    /// `filter_length` the number of filter coefficients per series (clamped
    /// to `[2, n - 10]`), and `nseries` the number of explanatory series.
    /// An error is returned for `nseries == 0`, which no clamping can
    /// repair.
    ///
    /// All remaining parameters start at neutral values: lag 0, low-pass
    /// cutoff `π/6`, band-pass cutoff 0 (plain low-pass target), no
    /// customization weighting, no regularization, no constraints.
    pub fn new(n: usize, filter_length: usize, nseries: usize) -> Result<MdfaParameters<T>> {
        if nseries == 0 {
            return Err(Error::InvalidDimension(
                "at least one explanatory series is required".to_string(),
            ));
        }
        let n = clamp_window(n);
        Ok(MdfaParameters {
            n,
            filter_length: clamp_filter_length(filter_length, n),
            nseries,
            lag: T::zero(),
            lowpass_cutoff: T::FRAC_PI_6(),
            bandpass_cutoff: T::zero(),
            alpha: T::zero(),
            lambda: T::zero(),
            smooth: T::zero(),
            decay_strength: T::zero(),
            decay_start: T::zero(),
            cross_corr: T::zero(),
            shift_constraint: T::zero(),
            i1: false,
            i2: false,
            dimension_version: 0,
            value_version: 0,
        })
    }

    /// Sets the in-sample window length, clamped to `[10, 1000]`.
    ///
    /// The filter length is re-clamped against the new window so the
    /// invariant `filter_length <= n - 10` keeps holding.
    pub fn set_insample_length(&mut self, n: usize) -> &mut Self {
        self.n = clamp_window(n);
        self.filter_length = clamp_filter_length(self.filter_length, self.n);
        self.dimension_version += 1;
        self
    }

    /// Sets the filter length, clamped to `[2, n - 10]`.
    pub fn set_filter_length(&mut self, filter_length: usize) -> &mut Self {
        self.filter_length = clamp_filter_length(filter_length, self.n);
        self.dimension_version += 1;
        self
    }

    /// Sets the number of explanatory series (at least 1).
    pub fn set_nseries(&mut self, nseries: usize) -> &mut Self {
        self.nseries = nseries.max(1);
        self.dimension_version += 1;
        self
    }

    /// Sets the lag of the filter output.
    ///
    /// A negative lag asks for a forecast of the target signal, a positive
    /// lag for a smoothed (delayed) estimate, and zero for nowcasting.
    pub fn set_lag(&mut self, lag: T) -> &mut Self {
        self.lag = lag;
        self.value_version += 1;
        self
    }

    /// Sets the upper pass-band edge in radians, clamped to `[0.001, π]`.
    ///
    /// The band-pass edge is re-clamped so it stays strictly below the new
    /// value.
    pub fn set_lowpass_cutoff(&mut self, cutoff: T) -> &mut Self {
        self.lowpass_cutoff = cutoff.max(T::from(0.001).unwrap()).min(T::PI());
        self.bandpass_cutoff = self.bandpass_cutoff.min(self.lowpass_cutoff);
        self.value_version += 1;
        self
    }

    /// Sets the lower pass-band edge in radians, clamped to
    /// `[0, lowpass_cutoff]`.
    ///
    /// A zero band-pass edge selects a plain low-pass target.
    pub fn set_bandpass_cutoff(&mut self, cutoff: T) -> &mut Self {
        self.bandpass_cutoff = cutoff.max(T::zero()).min(self.lowpass_cutoff);
        self.value_version += 1;
        self
    }

    /// Sets the stop-band attenuation strength, clamped to be non-negative.
    pub fn set_alpha(&mut self, alpha: T) -> &mut Self {
        self.alpha = alpha.max(T::zero());
        self.value_version += 1;
        self
    }

    /// Sets the filter-speed (turning-point) weight, clamped to be
    /// non-negative.
    pub fn set_lambda(&mut self, lambda: T) -> &mut Self {
        self.lambda = lambda.max(T::zero());
        self.value_version += 1;
        self
    }

    /// Sets the coefficient-smoothness penalty weight, clamped to `[0, 1)`.
    pub fn set_smooth(&mut self, smooth: T) -> &mut Self {
        self.smooth = clamp_unit(smooth);
        self.value_version += 1;
        self
    }

    /// Sets the coefficient-decay penalty weight, clamped to `[0, 1)`.
    pub fn set_decay_strength(&mut self, strength: T) -> &mut Self {
        self.decay_strength = clamp_unit(strength);
        self.value_version += 1;
        self
    }

    /// Sets the lag at which the decay penalty starts biting, clamped to
    /// `[0, 1)`.
    pub fn set_decay_start(&mut self, start: T) -> &mut Self {
        self.decay_start = clamp_unit(start);
        self.value_version += 1;
        self
    }

    /// Sets the cross-series deviation penalty weight, clamped to `[0, 1)`.
    pub fn set_cross_corr(&mut self, cross: T) -> &mut Self {
        self.cross_corr = clamp_unit(cross);
        self.value_version += 1;
        self
    }

    /// Sets the target value of the zero-frequency derivative constraint
    /// (only meaningful together with [`set_i2`](Self::set_i2)).
    pub fn set_shift_constraint(&mut self, shift: T) -> &mut Self {
        self.shift_constraint = shift;
        self.value_version += 1;
        self
    }

    /// Enables or disables the zero-frequency gain constraint (sum of each
    /// series' coefficients equals one).
    pub fn set_i1(&mut self, on: bool) -> &mut Self {
        self.i1 = on;
        self.dimension_version += 1;
        self
    }

    /// Enables or disables the zero-frequency derivative constraint (the
    /// lag-relative first moment of each series' coefficients equals the
    /// shift value).
    pub fn set_i2(&mut self, on: bool) -> &mut Self {
        self.i2 = on;
        self.dimension_version += 1;
        self
    }

    /// Returns the constraint mode selected by the `i1`/`i2` flags.
    pub fn constraint_mode(&self) -> ConstraintMode {
        ConstraintMode::from_flags(self.i1, self.i2)
    }

    /// Returns the lag mode selected by the current lag value.
    pub fn lag_mode(&self) -> LagMode {
        if self.lag < T::one() {
            LagMode::Forecast
        } else {
            LagMode::Smoothing
        }
    }
}

fn clamp_unit<T: Float>(x: T) -> T {
    x.max(T::zero()).min(T::from(0.999999).unwrap())
}

impl<T: Copy> MdfaParameters<T> {
    /// Returns the in-sample window length.
    pub fn insample_length(&self) -> usize {
        self.n
    }

    /// Returns the filter length per series.
    pub fn filter_length(&self) -> usize {
        self.filter_length
    }

    /// Returns the number of explanatory series.
    pub fn nseries(&self) -> usize {
        self.nseries
    }

    /// Returns the number of positive-frequency bins, `K = floor(n / 2)`.
    ///
    /// Frequency-domain arrays span bins `0..=K`, so they hold `K + 1`
    /// entries.
    pub fn num_bins(&self) -> usize {
        self.n / 2
    }

    /// Returns the length of the stacked coefficient vector,
    /// `nseries * filter_length`.
    pub fn coefficient_len(&self) -> usize {
        self.nseries * self.filter_length
    }

    /// Returns the lag.
    pub fn lag(&self) -> T {
        self.lag
    }

    /// Returns the upper pass-band edge in radians.
    pub fn lowpass_cutoff(&self) -> T {
        self.lowpass_cutoff
    }

    /// Returns the lower pass-band edge in radians.
    pub fn bandpass_cutoff(&self) -> T {
        self.bandpass_cutoff
    }

    /// Returns the stop-band attenuation strength.
    pub fn alpha(&self) -> T {
        self.alpha
    }

    /// Returns the filter-speed weight.
    pub fn lambda(&self) -> T {
        self.lambda
    }

    /// Returns the coefficient-smoothness penalty weight.
    pub fn smooth(&self) -> T {
        self.smooth
    }

    /// Returns the coefficient-decay penalty weight.
    pub fn decay_strength(&self) -> T {
        self.decay_strength
    }

    /// Returns the decay-start parameter.
    pub fn decay_start(&self) -> T {
        self.decay_start
    }

    /// Returns the cross-series deviation penalty weight.
    pub fn cross_corr(&self) -> T {
        self.cross_corr
    }

    /// Returns the zero-frequency derivative constraint value.
    pub fn shift_constraint(&self) -> T {
        self.shift_constraint
    }

    /// Returns whether the zero-frequency gain constraint is active.
    pub fn i1(&self) -> bool {
        self.i1
    }

    /// Returns whether the zero-frequency derivative constraint is active.
    pub fn i2(&self) -> bool {
        self.i2
    }

    /// Returns the counter bumped by every setter that changes matrix
    /// dimensions.
    pub fn dimension_version(&self) -> u64 {
        self.dimension_version
    }

    /// Returns the counter bumped by every setter that only changes matrix
    /// values.
    pub fn value_version(&self) -> u64 {
        self.value_version
    }
}

/// Which zero-frequency boundary constraints are active.
///
/// Each active constraint removes one degree of freedom per series from the
/// coefficient space; the design matrix maps the remaining free parameters
/// back to full-length coefficient vectors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConstraintMode {
    /// No boundary constraints; the full coefficient space is free.
    Unconstrained,
    /// Gain constraint only: each series' coefficients sum to one, so the
    /// frequency response at zero equals one.
    Gain,
    /// Derivative constraint only: each series' lag-relative first moment
    /// equals the shift value, pinning the response derivative at zero.
    Shift,
    /// Both constraints at once.
    GainAndShift,
}

impl ConstraintMode {
    /// Returns the mode corresponding to the `i1`/`i2` flag pair.
    pub fn from_flags(i1: bool, i2: bool) -> ConstraintMode {
        match (i1, i2) {
            (false, false) => ConstraintMode::Unconstrained,
            (true, false) => ConstraintMode::Gain,
            (false, true) => ConstraintMode::Shift,
            (true, true) => ConstraintMode::GainAndShift,
        }
    }

    /// Returns the number of coefficients eliminated per series.
    pub fn eliminated(&self) -> usize {
        match self {
            ConstraintMode::Unconstrained => 0,
            ConstraintMode::Gain | ConstraintMode::Shift => 1,
            ConstraintMode::GainAndShift => 2,
        }
    }
}

/// Whether the filter is running ahead of or behind the target.
///
/// The constraint elimination pivots around different lags in the two
/// cases: a forecast filter pins its first coefficients, a smoothing filter
/// pins the coefficients bracketing the integer part of the lag.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LagMode {
    /// `lag < 1`: nowcast or forecast.
    Forecast,
    /// `lag >= 1`: smoothing.
    Smoothing,
}

/// An MDFA filter design produced by the solver.
///
/// The type parameter `T` corresponds to the scalar type used in the
/// calculations. Typically it implements the [`Float`] trait.
#[derive(Debug, Clone)]
pub struct MdfaDesign<T> {
    /// Filter coefficients, one `filter_length`-long vector per explanatory
    /// series.
    ///
    /// Each vector is meant to be convolved causally against its series:
    /// `signal[t] = Σ_l coeff[l] · x[t - l]`.
    pub coefficients: Vec<Vec<T>>,
    /// Value of the frequency-domain least-squares criterion attained by the
    /// coefficients.
    pub criterion: T,
    /// Number of free parameters the solver actually optimized over, after
    /// constraint elimination.
    pub reduced_dimension: usize,
    /// Scale factor that put the regularization penalty on the same footing
    /// as the data term (the mean diagonal of the data normal matrix).
    pub regularization_balance: T,
    /// Ratio between the largest and smallest diagonal entry of the solved
    /// system; a rough conditioning indicator.
    pub diagonal_ratio: T,
}

impl<T: Float> MdfaDesign<T> {
    /// Applies series `index`'s coefficients to `data` as a causal
    /// convolution.
    ///
    /// Output sample `t` is `Σ_{l <= t} coeff[l] · data[t - l]`; the first
    /// `filter_length - 1` samples use the truncated sum.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn filter_series(&self, index: usize, data: &[T]) -> Vec<T> {
        let coeffs = &self.coefficients[index];
        (0..data.len())
            .map(|t| {
                let mut acc = T::zero();
                for (l, &c) in coeffs.iter().enumerate().take(t + 1) {
                    acc = acc + c * data[t - l];
                }
                acc
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn clamping() {
        let mut params = MdfaParameters::<f64>::new(5, 100, 1).unwrap();
        assert_eq!(params.insample_length(), 10);
        // only 10 observations, so the filter cannot be longer than 2
        assert_eq!(params.filter_length(), 2);
        params.set_insample_length(5000);
        assert_eq!(params.insample_length(), 1000);
        params.set_filter_length(40);
        assert_eq!(params.filter_length(), 40);
        params.set_insample_length(30);
        assert_eq!(params.filter_length(), 20);
        params.set_lowpass_cutoff(7.0);
        assert_eq!(params.lowpass_cutoff(), PI);
        params.set_lowpass_cutoff(-1.0);
        assert_eq!(params.lowpass_cutoff(), 0.001);
        params.set_bandpass_cutoff(0.5);
        assert_eq!(params.bandpass_cutoff(), 0.001);
        params.set_smooth(1.5);
        assert!(params.smooth() < 1.0);
    }

    #[test]
    fn version_tags() {
        let mut params = MdfaParameters::<f64>::new(200, 20, 2).unwrap();
        let dims = params.dimension_version();
        let values = params.value_version();
        params.set_lag(-2.0).set_lambda(3.0);
        assert_eq!(params.dimension_version(), dims);
        assert_eq!(params.value_version(), values + 2);
        params.set_filter_length(25).set_i1(true);
        assert_eq!(params.dimension_version(), dims + 2);
    }

    #[test]
    fn constraint_modes() {
        assert_eq!(
            ConstraintMode::from_flags(false, false),
            ConstraintMode::Unconstrained
        );
        assert_eq!(ConstraintMode::from_flags(true, true).eliminated(), 2);
        let mut params = MdfaParameters::<f64>::new(100, 10, 1).unwrap();
        assert_eq!(params.lag_mode(), LagMode::Forecast);
        params.set_lag(2.5);
        assert_eq!(params.lag_mode(), LagMode::Smoothing);
    }

    #[test]
    fn causal_convolution() {
        let design = MdfaDesign {
            coefficients: vec![vec![0.5, 0.25, 0.25]],
            criterion: 0.0,
            reduced_dimension: 0,
            regularization_balance: 0.0,
            diagonal_ratio: 1.0,
        };
        let out = design.filter_series(0, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(out, vec![0.5, 0.75, 1.0, 1.0]);
    }
}

//! Regularization matrices and constraint elimination.
//!
//! Three quadratic penalties shape the coefficient vector beyond the data
//! fit: a second-difference smoothness penalty, an exponential decay-in-lag
//! penalty, and a cross-series deviation penalty. Each is trace-normalized
//! so its strength is comparable across filter lengths. The module also
//! builds the constraint design matrix that eliminates the degrees of
//! freedom bound by the zero-frequency gain and derivative constraints,
//! together with the particular solution vector that satisfies those
//! constraints when every free parameter is zero.

use crate::error::{Error, Result};
use crate::types::{ConstraintMode, LagMode, MdfaParameters};
use ndarray::{Array1, Array2};
use num_traits::{Float, FloatConst};

/// The assembled penalty and constraint structures.
///
/// After [`build_into`](Self::build_into) returns, `q_smooth` holds the
/// *aggregate* penalty (smoothness plus decay, plus the cross penalty for
/// more than one series); `q_decay` and `q_cross` keep their individual
/// trace-normalized values. `des_mat` has one row per free parameter and
/// one column per coefficient; `w_eight` is the particular solution of the
/// constraint equations.
#[derive(Debug, Clone)]
pub struct RegularizationMatrices<T> {
    /// Aggregate penalty matrix, `(nseries·L) × (nseries·L)`.
    pub q_smooth: Array2<T>,
    /// Trace-normalized decay penalty.
    pub q_decay: Array2<T>,
    /// Trace-normalized cross-series deviation penalty (zero for a single
    /// series).
    pub q_cross: Array2<T>,
    /// Constraint design matrix, `reduced × (nseries·L)`.
    pub des_mat: Array2<T>,
    /// Particular solution of the constraint equations, `(nseries·L)`.
    pub w_eight: Array1<T>,
}

/// Returns the number of free parameters left after constraint
/// elimination: `nseries · (L - eliminated)`.
pub fn reduced_dimension<T: Float + FloatConst>(params: &MdfaParameters<T>) -> usize {
    params.nseries() * (params.filter_length() - params.constraint_mode().eliminated())
}

impl<T: Float + FloatConst + 'static> RegularizationMatrices<T> {
    /// Creates zeroed structures sized for the given parameter set.
    pub fn zeros(params: &MdfaParameters<T>) -> RegularizationMatrices<T> {
        let full = params.coefficient_len();
        let reduced = reduced_dimension(params);
        RegularizationMatrices {
            q_smooth: Array2::zeros((full, full)),
            q_decay: Array2::zeros((full, full)),
            q_cross: Array2::zeros((full, full)),
            des_mat: Array2::zeros((reduced, full)),
            w_eight: Array1::zeros(full),
        }
    }

    /// Builds the regularization structures into fresh storage.
    pub fn build(params: &MdfaParameters<T>) -> Result<RegularizationMatrices<T>> {
        let mut matrices = RegularizationMatrices::zeros(params);
        matrices.build_into(params)?;
        Ok(matrices)
    }

    /// Returns the number of free parameters (the row count of `des_mat`).
    pub fn reduced_dimension(&self) -> usize {
        self.des_mat.nrows()
    }

    /// Rebuilds the structures for a parameter set, reallocating only when
    /// the shapes changed.
    pub fn build_into(&mut self, params: &MdfaParameters<T>) -> Result<()> {
        let filter_length = params.filter_length();
        if filter_length < 2 {
            return Err(Error::InvalidDimension(format!(
                "filter length {filter_length} leaves no room for constraints"
            )));
        }
        let full = params.coefficient_len();
        let reduced = reduced_dimension(params);
        self.reset(full, reduced);

        let smooth = warp(params.smooth());
        let decay_strength = warp(params.decay_strength());
        let decay_start = warp(params.decay_start());
        let cross = warp(params.cross_corr());
        let nseries = params.nseries();

        fill_smoothness(&mut self.q_smooth, filter_length, nseries, smooth);
        trace_normalize(&mut self.q_smooth, smooth, nseries);
        fill_decay(
            &mut self.q_decay,
            filter_length,
            nseries,
            decay_strength,
            decay_start,
            params.lag(),
        );
        trace_normalize(&mut self.q_decay, decay_strength, nseries);
        if nseries > 1 {
            fill_cross(&mut self.q_cross, filter_length, nseries, cross);
            trace_normalize(&mut self.q_cross, cross, nseries);
        }

        // aggregate the penalties; the cross penalty only exists for a
        // multivariate fit
        self.q_smooth.zip_mut_with(&self.q_decay, |a, &b| *a = *a + b);
        if nseries > 1 {
            self.q_smooth.zip_mut_with(&self.q_cross, |a, &b| *a = *a + b);
        }

        fill_constraints(
            &mut self.des_mat,
            &mut self.w_eight,
            params.constraint_mode(),
            params.lag_mode(),
            params.lag(),
            params.shift_constraint(),
            filter_length,
            nseries,
        )
    }

    fn reset(&mut self, full: usize, reduced: usize) {
        if self.q_smooth.dim() != (full, full) || self.des_mat.dim() != (reduced, full) {
            self.q_smooth = Array2::zeros((full, full));
            self.q_decay = Array2::zeros((full, full));
            self.q_cross = Array2::zeros((full, full));
            self.des_mat = Array2::zeros((reduced, full));
            self.w_eight = Array1::zeros(full);
        } else {
            self.q_smooth.fill(T::zero());
            self.q_decay.fill(T::zero());
            self.q_cross.fill(T::zero());
            self.des_mat.fill(T::zero());
            self.w_eight.fill(T::zero());
        }
    }
}

// Map a unit-interval strength to [0, ∞); the knee of the tangent keeps
// small settings gentle and makes values near one overwhelming.
fn warp<T: Float + FloatConst>(x: T) -> T {
    T::from(100).unwrap() * (x.min(T::from(0.999999).unwrap()) * T::FRAC_PI_2()).tan()
}

// Second-difference penalty, one L×L block per series. The block is
// D₂ᵀD₂ scaled by the warped strength, where D₂ is the (L-2)×L
// second-difference operator; the product reproduces the asymmetric
// boundary stencils at rows 0, 1, L-2, L-1.
fn fill_smoothness<T: Float + 'static>(q: &mut Array2<T>, filter_length: usize, nseries: usize, strength: T) {
    if strength <= T::zero() || filter_length < 3 {
        return;
    }
    let two = T::from(2).unwrap();
    let mut d2 = Array2::<T>::zeros((filter_length - 2, filter_length));
    for r in 0..filter_length - 2 {
        d2[[r, r]] = T::one();
        d2[[r, r + 1]] = -two;
        d2[[r, r + 2]] = T::one();
    }
    let block = d2.t().dot(&d2);
    for s in 0..nseries {
        let base = s * filter_length;
        for i in 0..filter_length {
            for j in 0..filter_length {
                q[[base + i, base + j]] = strength * block[[i, j]];
            }
        }
    }
}

// Exponential decay-in-lag penalty: diagonal within each block, growing
// away from the lag position.
fn fill_decay<T: Float>(
    q: &mut Array2<T>,
    filter_length: usize,
    nseries: usize,
    strength: T,
    start: T,
    lag: T,
) {
    if strength <= T::zero() {
        return;
    }
    let two = T::from(2).unwrap();
    let base_rate = T::one() + start;
    for s in 0..nseries {
        let base = s * filter_length;
        for t in 0..filter_length {
            let distance = (T::from(t).unwrap() - lag).abs();
            q[[base + t, base + t]] = strength * base_rate.powf(two * distance);
        }
    }
}

// Cross-series deviation penalty: at each lag position, the identity
// across series minus the uniform 1/nseries coupling, so deviations from
// the cross-series mean are penalized and a common shift is free.
fn fill_cross<T: Float>(q: &mut Array2<T>, filter_length: usize, nseries: usize, strength: T) {
    if strength <= T::zero() {
        return;
    }
    let coupling = T::from(nseries).unwrap().recip();
    for l in 0..filter_length {
        for i in 0..nseries {
            for j in 0..nseries {
                let value = if i == j {
                    strength * (T::one() - coupling)
                } else {
                    -strength * coupling
                };
                q[[i * filter_length + l, j * filter_length + l]] = value;
            }
        }
    }
}

// Scale a penalty so that strengths are comparable regardless of the
// filter length: strength / (nseries · trace).
fn trace_normalize<T: Float>(q: &mut Array2<T>, strength: T, nseries: usize) {
    let trace = q.diag().sum();
    if trace <= T::zero() {
        return;
    }
    let scale = strength / (T::from(nseries).unwrap() * trace);
    q.mapv_inplace(|v| v * scale);
}

// Lags eliminated by the gain constraint.
fn gain_pivot<T: Float>(lag_mode: LagMode, lag: T, filter_length: usize) -> usize {
    match lag_mode {
        LagMode::Forecast => 0,
        LagMode::Smoothing => (lag.floor().to_usize().unwrap()).min(filter_length - 1),
    }
}

// Lag eliminated by the derivative constraint when it acts alone.
fn shift_pivot<T: Float>(lag_mode: LagMode, lag: T, filter_length: usize) -> usize {
    match lag_mode {
        LagMode::Forecast => 1,
        LagMode::Smoothing => (lag.floor().to_usize().unwrap() + 1).min(filter_length - 1),
    }
}

// Adjacent lag pair eliminated when both constraints act.
fn pivot_pair<T: Float>(lag_mode: LagMode, lag: T, filter_length: usize) -> (usize, usize) {
    match lag_mode {
        LagMode::Forecast => (0, 1),
        LagMode::Smoothing => {
            let e1 = (lag.floor().to_usize().unwrap()).min(filter_length - 2);
            (e1, e1 + 1)
        }
    }
}

// Build des_mat and w_eight, one series block at a time. Each block is
// independent: rows [s·R₀, (s+1)·R₀) map to columns [s·L, (s+1)·L).
//
// Every des_mat row spans a direction along which the active constraints
// are invariant, and w_eight satisfies them exactly, so any solver output
// back-projected through these structures satisfies the constraints to
// machine precision.
#[allow(clippy::too_many_arguments)]
fn fill_constraints<T: Float + FloatConst>(
    des_mat: &mut Array2<T>,
    w_eight: &mut Array1<T>,
    mode: ConstraintMode,
    lag_mode: LagMode,
    lag: T,
    shift: T,
    filter_length: usize,
    nseries: usize,
) -> Result<()> {
    // per-series zero-frequency gain target
    let gain = T::one();
    let per_series = filter_length - mode.eliminated();
    for s in 0..nseries {
        let row_base = s * per_series;
        let col_base = s * filter_length;
        match mode {
            ConstraintMode::Unconstrained => {
                for l in 0..filter_length {
                    des_mat[[row_base + l, col_base + l]] = T::one();
                }
            }
            ConstraintMode::Gain => {
                let e = gain_pivot(lag_mode, lag, filter_length);
                let mut row = row_base;
                for l in (0..filter_length).filter(|&l| l != e) {
                    des_mat[[row, col_base + l]] = T::one();
                    des_mat[[row, col_base + e]] = -T::one();
                    row += 1;
                }
                w_eight[col_base + e] = gain;
            }
            ConstraintMode::Shift => {
                let e = shift_pivot(lag_mode, lag, filter_length);
                let denom = T::from(e).unwrap() - lag;
                if denom.abs() < T::from(1e-9).unwrap() {
                    return Err(Error::InvalidDimension(format!(
                        "lag coincides with the elimination pivot {e}"
                    )));
                }
                let mut row = row_base;
                for l in (0..filter_length).filter(|&l| l != e) {
                    des_mat[[row, col_base + l]] = T::one();
                    des_mat[[row, col_base + e]] = -(T::from(l).unwrap() - lag) / denom;
                    row += 1;
                }
                w_eight[col_base + e] = shift / denom;
            }
            ConstraintMode::GainAndShift => {
                let (e1, e2) = pivot_pair(lag_mode, lag, filter_length);
                let delta = T::from(e2 - e1).unwrap();
                let mut row = row_base;
                for l in (0..filter_length).filter(|&l| l != e1 && l != e2) {
                    let l_t = T::from(l).unwrap();
                    des_mat[[row, col_base + l]] = T::one();
                    des_mat[[row, col_base + e1]] = -(T::from(e2).unwrap() - l_t) / delta;
                    des_mat[[row, col_base + e2]] = -(l_t - T::from(e1).unwrap()) / delta;
                    row += 1;
                }
                w_eight[col_base + e1] = ((T::from(e2).unwrap() - lag) * gain - shift) / delta;
                w_eight[col_base + e2] = (shift - (T::from(e1).unwrap() - lag) * gain) / delta;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(
        filter_length: usize,
        nseries: usize,
        i1: bool,
        i2: bool,
        lag: f64,
    ) -> MdfaParameters<f64> {
        let mut params = MdfaParameters::new(100, filter_length, nseries).unwrap();
        params
            .set_i1(i1)
            .set_i2(i2)
            .set_lag(lag)
            .set_shift_constraint(-3.0);
        params
    }

    fn block_sum(v: &Array1<f64>, series: usize, len: usize) -> f64 {
        (0..len).map(|l| v[series * len + l]).sum()
    }

    fn block_moment(v: &Array1<f64>, series: usize, len: usize, lag: f64) -> f64 {
        (0..len).map(|l| (l as f64 - lag) * v[series * len + l]).sum()
    }

    #[test]
    fn reduced_dimensions_follow_constraint_table() {
        for nseries in [1, 3] {
            for (i1, i2, expected) in [
                (false, false, 8),
                (true, false, 7),
                (false, true, 7),
                (true, true, 6),
            ] {
                let params = params(8, nseries, i1, i2, 0.0);
                let matrices = RegularizationMatrices::build(&params).unwrap();
                assert_eq!(matrices.des_mat.dim(), (nseries * expected, nseries * 8));
                assert_eq!(matrices.reduced_dimension(), reduced_dimension(&params));
            }
        }
    }

    #[test]
    fn design_rows_are_constraint_invariant() {
        for lag in [-2.0, 0.0, 0.5, 1.0, 2.5] {
            let params = params(9, 2, true, true, lag);
            let matrices = RegularizationMatrices::build(&params).unwrap();
            for row in matrices.des_mat.rows() {
                let row = row.to_owned();
                for s in 0..2 {
                    assert!(block_sum(&row, s, 9).abs() < 1e-12);
                    assert!(block_moment(&row, s, 9, lag).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn particular_solution_satisfies_constraints() {
        for lag in [-1.0, 0.0, 2.5] {
            let params = params(9, 2, true, true, lag);
            let matrices = RegularizationMatrices::build(&params).unwrap();
            for s in 0..2 {
                assert!((block_sum(&matrices.w_eight, s, 9) - 1.0).abs() < 1e-12);
                assert!((block_moment(&matrices.w_eight, s, 9, lag) - (-3.0)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn forecast_particular_solution_closed_form() {
        // for lag < 1 the two pinned coefficients are the first two lags
        let lag = -1.5;
        let shift = -3.0;
        let params = params(7, 1, true, true, lag);
        let matrices = RegularizationMatrices::build(&params).unwrap();
        assert!((matrices.w_eight[0] - (-(lag - 1.0) - shift)).abs() < 1e-12);
        assert!((matrices.w_eight[1] - (lag + shift)).abs() < 1e-12);
        for l in 2..7 {
            assert_eq!(matrices.w_eight[l], 0.0);
        }
    }

    #[test]
    fn smoothing_pivots_bracket_the_lag() {
        let params = params(10, 1, true, true, 3.4);
        let matrices = RegularizationMatrices::build(&params).unwrap();
        // only the bracketing lags 3 and 4 carry the particular solution
        for l in 0..10 {
            if l == 3 || l == 4 {
                assert!(matrices.w_eight[l] != 0.0);
            } else {
                assert_eq!(matrices.w_eight[l], 0.0);
            }
        }
    }

    #[test]
    fn smoothness_block_matches_second_difference_product() {
        let filter_length = 7;
        let mut p = MdfaParameters::<f64>::new(100, filter_length, 1).unwrap();
        p.set_smooth(0.3);
        let matrices = RegularizationMatrices::build(&p).unwrap();
        let strength = 100.0 * (0.3f64 * std::f64::consts::FRAC_PI_2).tan();
        // trace of the unit block is 6·(L-2); the normalized block is
        // strength · D₂ᵀD₂ / trace
        let mut d2 = Array2::<f64>::zeros((filter_length - 2, filter_length));
        for r in 0..filter_length - 2 {
            d2[[r, r]] = 1.0;
            d2[[r, r + 1]] = -2.0;
            d2[[r, r + 2]] = 1.0;
        }
        let expected = d2.t().dot(&d2);
        let scale = strength / (6.0 * (filter_length as f64 - 2.0));
        for i in 0..filter_length {
            for j in 0..filter_length {
                assert!((matrices.q_smooth[[i, j]] - scale * expected[[i, j]]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn decay_diagonal_grows_away_from_lag() {
        let mut p = MdfaParameters::<f64>::new(100, 8, 1).unwrap();
        p.set_decay_strength(0.2).set_decay_start(0.1).set_lag(2.0);
        let matrices = RegularizationMatrices::build(&p).unwrap();
        // diagonal, with its minimum at the lag position
        for i in 0..8 {
            for j in 0..8 {
                if i != j {
                    assert_eq!(matrices.q_decay[[i, j]], 0.0);
                }
            }
        }
        assert!(matrices.q_decay[[2, 2]] < matrices.q_decay[[0, 0]]);
        assert!(matrices.q_decay[[2, 2]] < matrices.q_decay[[7, 7]]);
        // aggregate holds the decay penalty since smoothness is off
        assert_eq!(matrices.q_smooth, matrices.q_decay);
    }

    #[test]
    fn cross_penalty_couples_matching_lags() {
        let mut p = MdfaParameters::<f64>::new(100, 4, 3).unwrap();
        p.set_cross_corr(0.5);
        let matrices = RegularizationMatrices::build(&p).unwrap();
        let q = &matrices.q_cross;
        let diag = q[[0, 0]];
        assert!(diag > 0.0);
        // uniform coupling is -1/2 of the diagonal for three series
        assert!((q[[0, 4]] - (-0.5 * diag)).abs() < 1e-12);
        assert!((q[[0, 8]] - (-0.5 * diag)).abs() < 1e-12);
        // no coupling across different lags
        assert_eq!(q[[0, 5]], 0.0);
        // trace normalization: trace equals warped strength / nseries
        let strength = 100.0 * (0.5f64 * std::f64::consts::FRAC_PI_2).tan();
        let trace: f64 = q.diag().sum();
        assert!((trace - strength / 3.0).abs() < 1e-9);
    }

    #[test]
    fn shift_only_pivot_rejects_degenerate_lag() {
        // clamped pivot L-1 coincides with an integer lag of L-1
        let params = params(4, 1, false, true, 3.0);
        assert!(matches!(
            RegularizationMatrices::build(&params),
            Err(Error::InvalidDimension(_))
        ));
    }
}

//! Stateful coordination of parameter mutation and matrix lifecycles.
//!
//! The matrix builders are pure functions of a parameter snapshot, but a
//! real-time caller mutates parameters between solves and should not pay
//! for reallocation when only values changed. [`MdfaEstimator`] owns the
//! parameter set and the cached matrix structures, and uses the parameter
//! set's version counters to decide what must be rebuilt before the next
//! solve: a dimension change reallocates every dependent structure, a
//! value-only change refills them in place, and the regularization
//! structures are reused untouched when no parameter changed at all.
//! A solve never observes a half-updated structure set.

use crate::customization::{self, CustomizationMatrices};
use crate::error::Result;
use crate::regularization::RegularizationMatrices;
use crate::solve_backend::LinearSolverBackend;
use crate::solver::{SolverOutput, solve_coefficients};
use crate::spectral::{SeriesWindow, spectral_snapshot_tail};
use crate::types::{MdfaDesign, MdfaParameters};
use crate::weightings::{SmoothingSpec, TargetSpec};
use num_traits::{Float, FloatConst};

/// Coordinating factory for repeated solves over a mutable parameter set.
///
/// All parameter mutation goes through
/// [`parameters_mut`](Self::parameters_mut); the estimator compares the
/// version counters on each solve and rebuilds exactly what the mutation
/// invalidated.
#[derive(Debug)]
pub struct MdfaEstimator<T> {
    params: MdfaParameters<T>,
    weightings: Option<(TargetSpec<T>, SmoothingSpec<T>)>,
    custom: CustomizationMatrices<T>,
    reg: RegularizationMatrices<T>,
    built_versions: Option<(u64, u64)>,
}

impl<T: Float + FloatConst + 'static> MdfaEstimator<T> {
    /// Creates an estimator around a parameter set.
    pub fn new(params: MdfaParameters<T>) -> MdfaEstimator<T> {
        let custom = CustomizationMatrices::zeros(params.num_bins(), params.coefficient_len());
        let reg = RegularizationMatrices::zeros(&params);
        MdfaEstimator {
            params,
            weightings: None,
            custom,
            reg,
            built_versions: None,
        }
    }

    /// Returns the current parameter set.
    pub fn parameters(&self) -> &MdfaParameters<T> {
        &self.params
    }

    /// Returns the parameter set for mutation.
    ///
    /// The clamping setters on [`MdfaParameters`] record which kind of
    /// change happened; the next solve rebuilds accordingly.
    pub fn parameters_mut(&mut self) -> &mut MdfaParameters<T> {
        &mut self.params
    }

    /// Replaces the default parameter-derived target and smoothing
    /// weightings with explicit ones.
    pub fn set_weightings(&mut self, target: TargetSpec<T>, smoothing: SmoothingSpec<T>) {
        self.weightings = Some((target, smoothing));
        self.built_versions = None;
    }

    /// Restores the default weightings derived from the parameter set.
    pub fn clear_weightings(&mut self) {
        self.weightings = None;
        self.built_versions = None;
    }

    /// Computes filter coefficients for the current parameters with the
    /// default linear-solve backend.
    ///
    /// `target` is the series whose signal is extracted; `explanatory`
    /// holds one series per configured `nseries` (for a univariate filter,
    /// the target itself). Each series contributes its last `n`
    /// observations.
    #[cfg(any(
        feature = "lapack-backend",
        feature = "faer-backend",
        feature = "nalgebra-backend"
    ))]
    pub fn compute_filter_coefficients(
        &mut self,
        target: &SeriesWindow<'_, T>,
        explanatory: &[SeriesWindow<'_, T>],
    ) -> Result<MdfaDesign<T>>
    where
        crate::solve_backend::DefaultSolverBackend: LinearSolverBackend<T>,
    {
        self.compute_filter_coefficients_with_backend(
            target,
            explanatory,
            &crate::solve_backend::DefaultSolverBackend::default(),
        )
    }

    /// Computes filter coefficients with an explicit linear-solve backend.
    pub fn compute_filter_coefficients_with_backend<B: LinearSolverBackend<T>>(
        &mut self,
        target: &SeriesWindow<'_, T>,
        explanatory: &[SeriesWindow<'_, T>],
        backend: &B,
    ) -> Result<MdfaDesign<T>> {
        let n = self.params.insample_length();
        let target_snapshot = spectral_snapshot_tail(target, n)?;
        let mut snapshots = Vec::with_capacity(explanatory.len());
        for series in explanatory {
            snapshots.push(spectral_snapshot_tail(series, n)?);
        }

        self.refresh_regularization()?;
        match &self.weightings {
            Some((target_spec, smoothing)) => customization::build_into(
                &mut self.custom,
                &self.params,
                &snapshots,
                &target_snapshot,
                target_spec,
                smoothing,
            )?,
            None => customization::build_into(
                &mut self.custom,
                &self.params,
                &snapshots,
                &target_snapshot,
                &TargetSpec::from_parameters(&self.params),
                &SmoothingSpec::from_parameters(&self.params),
            )?,
        }

        let output = solve_coefficients(&self.custom, &self.reg, backend)?;
        Ok(package_design(&self.params, output))
    }

    // The regularization structures depend only on the parameters, so they
    // survive across solves until a parameter version moves.
    fn refresh_regularization(&mut self) -> Result<()> {
        let versions = (
            self.params.dimension_version(),
            self.params.value_version(),
        );
        if self.built_versions != Some(versions) {
            self.reg.build_into(&self.params)?;
            self.built_versions = Some(versions);
        }
        Ok(())
    }
}

/// Slices a stacked solver output into the per-series design.
pub(crate) fn package_design<T: Float>(
    params: &MdfaParameters<T>,
    output: SolverOutput<T>,
) -> MdfaDesign<T> {
    let filter_length = params.filter_length();
    let coefficients = (0..params.nseries())
        .map(|s| {
            (0..filter_length)
                .map(|l| output.coefficients[s * filter_length + l])
                .collect()
        })
        .collect();
    MdfaDesign {
        coefficients,
        criterion: output.criterion,
        reduced_dimension: output.reduced_dimension,
        regularization_balance: output.regularization_balance,
        diagonal_ratio: output.diagonal_ratio,
    }
}

#[cfg(all(
    test,
    any(
        feature = "lapack-backend",
        feature = "faer-backend",
        feature = "nalgebra-backend"
    )
))]
mod test {
    use super::*;

    fn noisy_wave(n: usize) -> Vec<f64> {
        let mut state = 0x2545f4914f6cdd1du64;
        (0..n)
            .map(|t| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let noise = (state >> 33) as f64 / (1u64 << 31) as f64 - 1.0;
                (t as f64 * 0.11).sin() + 0.4 * noise
            })
            .collect()
    }

    #[test]
    fn dimension_change_resizes_the_design() {
        let mut params = MdfaParameters::<f64>::new(120, 12, 1).unwrap();
        params.set_i1(true).set_smooth(0.2);
        let mut estimator = MdfaEstimator::new(params);
        let data = noisy_wave(120);
        let window = SeriesWindow::new(&data);
        let design = estimator
            .compute_filter_coefficients(&window, &[window])
            .unwrap();
        assert_eq!(design.coefficients[0].len(), 12);

        estimator.parameters_mut().set_filter_length(20);
        let design = estimator
            .compute_filter_coefficients(&window, &[window])
            .unwrap();
        assert_eq!(design.coefficients[0].len(), 20);
    }

    #[test]
    fn value_change_keeps_shape_but_moves_values() {
        let mut params = MdfaParameters::<f64>::new(120, 12, 1).unwrap();
        params.set_i1(true).set_smooth(0.2);
        let mut estimator = MdfaEstimator::new(params);
        let data = noisy_wave(120);
        let window = SeriesWindow::new(&data);
        let before = estimator
            .compute_filter_coefficients(&window, &[window])
            .unwrap();
        estimator.parameters_mut().set_lag(2.0);
        let after = estimator
            .compute_filter_coefficients(&window, &[window])
            .unwrap();
        assert_eq!(
            before.coefficients[0].len(),
            after.coefficients[0].len()
        );
        let moved = before.coefficients[0]
            .iter()
            .zip(after.coefficients[0].iter())
            .any(|(a, b)| (a - b).abs() > 1e-9);
        assert!(moved);
    }

    #[test]
    fn repeated_solves_are_deterministic() {
        let mut params = MdfaParameters::<f64>::new(100, 10, 1).unwrap();
        params.set_i1(true).set_lambda(2.0).set_alpha(8.0);
        let mut estimator = MdfaEstimator::new(params);
        let data = noisy_wave(100);
        let window = SeriesWindow::new(&data);
        let first = estimator
            .compute_filter_coefficients(&window, &[window])
            .unwrap();
        let second = estimator
            .compute_filter_coefficients(&window, &[window])
            .unwrap();
        assert_eq!(first.coefficients, second.coefficients);
    }
}

//! # Multivariate Direct Filter Approach (MDFA)
//!
//! The [`mdfa`](crate) crate computes real-time (asymmetric, one-sided)
//! FIR filter coefficients for multivariate time-series signal
//! extraction. Given one or more stationary input series and a
//! specification of the desired frequency-domain behavior — pass band,
//! lag, smoothness, decay and cross-series regularization — it solves a
//! constrained least-squares problem in the frequency domain whose
//! solution approximates an ideal symmetric filter while remaining
//! causal.
//!
//! The pipeline has three stages. A periodogram-style spectral estimator
//! turns each series window into a complex snapshot over `K + 1`
//! frequency bins. The customization builder combines the snapshots with
//! the ideal target response and a stop-band smoothing weight into two
//! dense design matrices plus a target vector. The regularization builder
//! contributes coefficient-shape penalties and eliminates the degrees of
//! freedom bound by the zero-frequency gain and derivative constraints,
//! and the solver assembles the resulting normal equations, solves them
//! through a pluggable dense linear-algebra backend, and back-projects
//! the result into full-length coefficient vectors, one per series.
//!
//! ## Examples
//!
//! The one-shot entry point is [`mdfa_design`], which takes an
//! [`MdfaParameters`] object plus the target and explanatory series and
//! returns an [`MdfaDesign`] with the coefficients and solve diagnostics.
//!
//! ```
//! # #[cfg(any(feature = "lapack-backend", feature = "faer-backend", feature = "nalgebra-backend"))]
//! # fn main() -> Result<(), mdfa::error::Error> {
//! use mdfa::{MdfaParameters, mdfa_design};
//!
//! let data: Vec<f64> = (0..120).map(|t| (t as f64 * 0.2).sin()).collect();
//! let mut params = MdfaParameters::new(120, 12, 1)?;
//! params
//!     .set_i1(true)
//!     .set_smooth(0.3)
//!     .set_decay_strength(0.1)
//!     .set_lambda(2.0);
//! let design = mdfa_design(&params, &data, &[&data])?;
//! assert_eq!(design.coefficients[0].len(), 12);
//! let sum: f64 = design.coefficients[0].iter().sum();
//! assert!((sum - 1.0).abs() < 1e-6);
//! # Ok(())
//! # }
//! # #[cfg(not(any(feature = "lapack-backend", feature = "faer-backend", feature = "nalgebra-backend")))]
//! # fn main() {}
//! ```
//!
//! Callers that solve repeatedly while tuning parameters should use
//! [`MdfaEstimator`], which caches the dependent matrix structures and
//! rebuilds only what a parameter mutation invalidated.
//!
//! ## Building
//!
//! The `mdfa` crate supports different backends to solve the
//! normal-equations system. These are selected with feature flags. See
//! [`LinearSolverBackend`] for more details. By default, only the faer
//! backend is enabled, which is a pure Rust implementation.
//!
//! Another supported backend uses `ndarray_linalg` to solve the system
//! with LAPACK. It is enabled with the `lapack-backend` feature flag,
//! together with exactly one of `openblas-static`, `openblas-system`,
//! `netlib-static`, `netlib-system`, `intel-mkl-static` and
//! `intel-mkl-system` to select the LAPACK implementation to link
//! against. A third backend using `nalgebra` is enabled with the
//! `nalgebra-backend` feature flag.
//!
//! ## References
//!
//! \[1\] M. Wildi, "Real-Time Signal Extraction: Beyond Maximum
//! Likelihood Principles", Springer, 2008.
//!
//! \[2\] M. Wildi and T. McElroy, "Optimal Real-Time Filters for Linear
//! Prediction Problems", Journal of Time Series Econometrics, vol. 8,
//! no. 2, 2016.
//!
//! \[3\] M. Wildi, "Multivariate Direct Filter Analysis for Real-Time
//! Signal Extraction Problems: Customization and Regularization",
//! IDP working paper, 2012.

#![warn(missing_docs)]

use num_traits::{Float, FloatConst};

pub mod customization;
pub use customization::CustomizationMatrices;
pub mod error;
use error::{Error, Result};
mod estimator;
pub use estimator::MdfaEstimator;
#[cfg(feature = "lapack-backend")]
mod lapack;
#[cfg(feature = "lapack-backend")]
pub use lapack::{IsLapack, ToLapack};
pub mod regularization;
pub use regularization::RegularizationMatrices;
mod solve_backend;
#[cfg(any(
    feature = "faer-backend",
    feature = "lapack-backend",
    feature = "nalgebra-backend"
))]
pub use solve_backend::DefaultSolverBackend;
#[cfg(feature = "faer-backend")]
pub use solve_backend::FaerBackend;
#[cfg(feature = "lapack-backend")]
pub use solve_backend::LapackBackend;
#[cfg(feature = "nalgebra-backend")]
pub use solve_backend::NalgebraBackend;
pub use solve_backend::{LinearSolverBackend, SolveError};
pub mod solver;
pub mod spectral;
use spectral::SeriesWindow;
mod types;
pub use types::{ConstraintMode, LagMode, MdfaDesign, MdfaParameters};
pub mod weightings;

/// Computes a real-time MDFA filter design.
///
/// This function solves the MDFA least-squares problem for the given
/// parameter set. The `target` series defines the signal to extract and
/// the phase reference; `explanatory` holds one series per configured
/// `nseries` (for a univariate filter, the target itself). Each series
/// contributes the last `n` in-sample observations, where `n` is the
/// parameter set's window length.
///
/// The target response and the stop-band smoothing weight are derived
/// from the parameter set (an ideal low-pass or band-pass indicator and
/// an exponential stop-band profile). Use an [`MdfaEstimator`] with
/// [`MdfaEstimator::set_weightings`] for custom per-bin functions.
///
/// This function uses the [`DefaultSolverBackend`] to solve the
/// normal-equations system. The backend that is selected as default
/// backend depends on the feature flags. Use [`mdfa_design_with_backend`]
/// to specify a particular backend.
#[cfg(any(
    feature = "lapack-backend",
    feature = "faer-backend",
    feature = "nalgebra-backend"
))]
pub fn mdfa_design<T>(
    params: &MdfaParameters<T>,
    target: &[T],
    explanatory: &[&[T]],
) -> Result<MdfaDesign<T>>
where
    T: Float + FloatConst + 'static,
    DefaultSolverBackend: LinearSolverBackend<T>,
{
    mdfa_design_with_backend(params, target, explanatory, &DefaultSolverBackend::default())
}

/// Computes a real-time MDFA filter design with a specific linear-solve
/// backend.
///
/// This function behaves like [`mdfa_design`], but it additionally allows
/// a linear-solve backend to be specified. The backend must support the
/// scalar type `T` that is used. See the [`LinearSolverBackend`] trait
/// for more details.
pub fn mdfa_design_with_backend<T, B>(
    params: &MdfaParameters<T>,
    target: &[T],
    explanatory: &[&[T]],
    backend: &B,
) -> Result<MdfaDesign<T>>
where
    T: Float + FloatConst + 'static,
    B: LinearSolverBackend<T>,
{
    if explanatory.len() != params.nseries() {
        return Err(Error::SeriesCountMismatch {
            expected: params.nseries(),
            actual: explanatory.len(),
        });
    }
    let target = SeriesWindow::new(target);
    let explanatory: Vec<SeriesWindow<'_, T>> =
        explanatory.iter().map(|s| SeriesWindow::new(s)).collect();
    let mut estimator = MdfaEstimator::new(params.clone());
    estimator.compute_filter_coefficients_with_backend(&target, &explanatory, backend)
}

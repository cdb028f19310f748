//! Normal-equations assembly and solve.
//!
//! The solver combines the data-side customization matrices with the
//! penalty and constraint structures into a symmetric linear system over
//! the free parameters, solves it through a [`LinearSolverBackend`], and
//! back-projects the result into the full coefficient space. The order of
//! the algebraic operations matters for numerical parity and is kept
//! explicit below.

use crate::customization::CustomizationMatrices;
use crate::error::{Error, Result};
use crate::regularization::RegularizationMatrices;
use crate::solve_backend::LinearSolverBackend;
use itertools::{Itertools, MinMaxResult};
use ndarray::{Array1, Array2};
use num_traits::Float;

/// Raw solver result over the stacked coefficient space.
///
/// The stacked vector is sliced per series by the caller; the remaining
/// fields are diagnostics surfaced in the final design.
#[derive(Debug, Clone)]
pub struct SolverOutput<T> {
    /// Stacked coefficient vector of length `nseries·L`.
    pub coefficients: Array1<T>,
    /// Attained frequency-domain least-squares criterion.
    pub criterion: T,
    /// Number of free parameters after constraint elimination.
    pub reduced_dimension: usize,
    /// Mean diagonal of the data normal matrix, used to scale the penalty.
    pub regularization_balance: T,
    /// Ratio of the largest to the smallest diagonal entry of the solved
    /// system.
    pub diagonal_ratio: T,
}

/// Assembles and solves the normal equations.
///
/// Fails with [`Error::InvalidDimension`] when the customization and
/// regularization structures disagree on the coefficient-space dimension,
/// and with [`Error::SingularSystem`] when the factorization fails or
/// produces non-finite values. No fallback coefficients are ever returned.
pub fn solve_coefficients<T, B>(
    custom: &CustomizationMatrices<T>,
    reg: &RegularizationMatrices<T>,
    backend: &B,
) -> Result<SolverOutput<T>>
where
    T: Float + 'static,
    B: LinearSolverBackend<T>,
{
    let full = custom.rex.ncols();
    if reg.q_smooth.nrows() != full || reg.des_mat.ncols() != full || reg.w_eight.len() != full {
        return Err(Error::InvalidDimension(format!(
            "customization spans {} coefficients, regularization spans {}",
            full,
            reg.des_mat.ncols()
        )));
    }
    let reduced = reg.des_mat.nrows();
    let des_t = reg.des_mat.t();

    // penalty projected into the free-parameter space, plus its pull on
    // the particular solution
    let des = reg.q_smooth.dot(&des_t);
    let mut reg_mat = reg.des_mat.dot(&des);
    let temp = reg.q_smooth.dot(&reg.w_eight);
    let mut reg_xtxy = reg.des_mat.dot(&temp);

    // restore the penalty's nominal strength after projection
    if reg.q_smooth[[0, 0]] != T::zero() {
        let projected = mean_diag(&reg_mat);
        if projected != T::zero() {
            let scale = mean_diag(&reg.q_smooth) / projected;
            reg_mat.mapv_inplace(|v| v * scale);
            reg_xtxy.mapv_inplace(|v| v * scale);
        }
    }

    // data term in the free-parameter space
    let rex_r = custom.rex.dot(&des_t);
    let imx_r = custom.imx.dot(&des_t);
    let mut xtx = rex_r.t().dot(&rex_r) + imx_r.t().dot(&imx_r);
    let rex_w = custom.rex.dot(&reg.w_eight);
    let imx_w = custom.imx.dot(&reg.w_eight);
    let particular_pull = rex_r.t().dot(&rex_w) + imx_r.t().dot(&imx_w);
    let dev = mean_diag(&xtx);

    let mut rhs = rex_r.t().dot(&custom.rh_gamma) - particular_pull;
    rhs.zip_mut_with(&reg_xtxy, |a, &r| *a = *a - dev * r);
    xtx.zip_mut_with(&reg_mat, |a, &r| *a = *a + dev * r);

    let diagonal_ratio = match xtx.diag().iter().map(|v| v.abs()).minmax() {
        MinMaxResult::MinMax(min, max) if min > T::zero() => max / min,
        _ => T::one(),
    };

    let y = if reduced == 0 {
        Array1::zeros(0)
    } else {
        backend.solve(xtx, rhs)?
    };
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::SingularSystem(
            "factorization produced non-finite values".to_string(),
        ));
    }
    let coefficients = des_t.dot(&y) + &reg.w_eight;

    let criterion = residual_criterion(custom, &coefficients);
    Ok(SolverOutput {
        coefficients,
        criterion,
        reduced_dimension: reduced,
        regularization_balance: dev,
        diagonal_ratio,
    })
}

// Value of the frequency-domain criterion at a coefficient vector.
fn residual_criterion<T: Float + 'static>(
    custom: &CustomizationMatrices<T>,
    coefficients: &Array1<T>,
) -> T {
    let fit_re = custom.rex.dot(coefficients);
    let fit_im = custom.imx.dot(coefficients);
    let mut criterion = T::zero();
    for j in 0..custom.rh_gamma.len() {
        let re = custom.rh_gamma[j] - fit_re[j];
        let im = fit_im[j];
        criterion = criterion + re * re + im * im;
    }
    criterion
}

fn mean_diag<T: Float>(m: &Array2<T>) -> T {
    let n = m.nrows();
    if n == 0 {
        return T::zero();
    }
    m.diag().sum() / T::from(n).unwrap()
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn mean_diag_is_trace_over_dimension() {
        let m = array![[2.0, 7.0], [7.0, 4.0]];
        assert_eq!(mean_diag(&m), 3.0);
        assert_eq!(mean_diag(&Array2::<f64>::zeros((0, 0))), 0.0);
    }

    #[cfg(any(
        feature = "lapack-backend",
        feature = "faer-backend",
        feature = "nalgebra-backend"
    ))]
    #[test]
    fn unregularized_identity_system_reproduces_target() {
        use crate::solve_backend::DefaultSolverBackend;

        // two bins, two coefficients, identity design: the least-squares
        // solution is the target vector itself
        let custom = CustomizationMatrices {
            rex: array![[1.0, 0.0], [0.0, 1.0]],
            imx: Array2::zeros((2, 2)),
            rh_gamma: array![1.0, 2.0],
        };
        let reg = RegularizationMatrices {
            q_smooth: Array2::zeros((2, 2)),
            q_decay: Array2::zeros((2, 2)),
            q_cross: Array2::zeros((2, 2)),
            des_mat: array![[1.0, 0.0], [0.0, 1.0]],
            w_eight: Array1::zeros(2),
        };
        let output =
            solve_coefficients(&custom, &reg, &DefaultSolverBackend::default()).unwrap();
        assert!((output.coefficients[0] - 1.0).abs() < 1e-12);
        assert!((output.coefficients[1] - 2.0).abs() < 1e-12);
        assert!(output.criterion < 1e-20);
        assert_eq!(output.reduced_dimension, 2);
    }

    #[cfg(any(
        feature = "lapack-backend",
        feature = "faer-backend",
        feature = "nalgebra-backend"
    ))]
    #[test]
    fn zero_reduced_dimension_returns_particular_solution() {
        use crate::solve_backend::DefaultSolverBackend;

        let custom = CustomizationMatrices {
            rex: array![[1.0, 1.0], [0.5, -0.5]],
            imx: Array2::zeros((2, 2)),
            rh_gamma: array![1.0, 0.0],
        };
        let reg = RegularizationMatrices {
            q_smooth: Array2::zeros((2, 2)),
            q_decay: Array2::zeros((2, 2)),
            q_cross: Array2::zeros((2, 2)),
            des_mat: Array2::zeros((0, 2)),
            w_eight: array![0.75, 0.25],
        };
        let output =
            solve_coefficients(&custom, &reg, &DefaultSolverBackend::default()).unwrap();
        assert_eq!(output.coefficients.to_vec(), vec![0.75, 0.25]);
        assert_eq!(output.reduced_dimension, 0);
    }
}

use crate::error::Error;
use ndarray::{Array1, Array2};

/// Linear-solve backend.
///
/// This trait models a backend that solves dense square linear systems
/// `A·y = b` with real scalars of type `T`, as needed for the
/// normal-equations step of the coefficient solver.
///
/// `mdfa` includes support for several Rust linear algebra libraries
/// through types that implement this trait. These libraries are optional
/// and selected with feature flags. At the moment the following backends
/// are supported:
///
/// - `lapack-backend` feature flag. This defines the `LapackBackend`
///   backend, which uses `ndarray_linalg` to solve systems with LAPACK.
///
/// - `faer-backend` feature flag. This defines the `FaerBackend` backend,
///   which uses `faer` to solve systems with a partial-pivoting LU
///   factorization.
///
/// - `nalgebra-backend` feature flag. This defines the `NalgebraBackend`,
///   which uses `nalgebra` to solve systems with an LU factorization.
pub trait LinearSolverBackend<T> {
    /// Solves the dense square system `matrix · y = rhs` for `y`.
    ///
    /// An error is returned if the factorization reports a singular
    /// matrix. Backends are not required to detect near-singularity; the
    /// caller checks the solution for finiteness.
    ///
    /// # Panics
    ///
    /// This function is allowed to panic if `matrix` is not square or its
    /// dimension does not match `rhs`.
    fn solve(&self, matrix: Array2<T>, rhs: Array1<T>) -> Result<Array1<T>>;
}

type Result<T> = std::result::Result<T, SolveError>;

/// Linear-solve error.
///
/// This struct represents an error obtained by a linear-solve backend
/// during a factorization or solve. The error contains a descriptive
/// string of the problem.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SolveError(pub String);

impl From<SolveError> for Error {
    fn from(value: SolveError) -> Error {
        Error::SingularSystem(value.0)
    }
}

#[cfg(any(
    feature = "lapack-backend",
    feature = "faer-backend",
    feature = "nalgebra-backend"
))]
macro_rules! default_solver_doc {
    () => {
        r#" Default linear-solve backend.

 This defines the default linear-solve backend, which depends on what
 feature flags are enabled. The selected default backend is the first
 available from this priority list:

 - `lapack-backend`
 - `faer-backend`
 - `nalgebra-backend`
"#
    };
}

#[doc = default_solver_doc!()]
#[cfg(feature = "lapack-backend")]
pub type DefaultSolverBackend = LapackBackend;

#[doc = default_solver_doc!()]
#[cfg(all(not(feature = "lapack-backend"), feature = "faer-backend"))]
pub type DefaultSolverBackend = FaerBackend;

#[doc = default_solver_doc!()]
#[cfg(all(
    not(any(feature = "lapack-backend", feature = "faer-backend")),
    feature = "nalgebra-backend"
))]
pub type DefaultSolverBackend = NalgebraBackend;

#[cfg(feature = "lapack-backend")]
pub use lapack::LapackBackend;

#[cfg(feature = "lapack-backend")]
mod lapack {
    use super::*;
    use crate::lapack::ToLapack;
    use ndarray_linalg::{Solve, error::LinalgError};

    /// LAPACK linear-solve backend.
    ///
    /// This is a backend that uses [`ndarray_linalg`] to solve dense
    /// systems with LAPACK. For types natively supported by LAPACK, which
    /// are `f64` and `f32`, the calculations are done directly using that
    /// type. For other types, the [`ToLapack`] trait is used to convert
    /// the type `T` into a type (generally `f64`) that can be handled by
    /// LAPACK.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct LapackBackend {}

    impl<T: ToLapack> LinearSolverBackend<T> for LapackBackend {
        fn solve(&self, matrix: Array2<T>, rhs: Array1<T>) -> Result<Array1<T>> {
            let matrix = T::array_to_lapack(matrix);
            let rhs = T::array_to_lapack(rhs);
            let solution = matrix.solve_into(rhs)?;
            Ok(solution.map(|y| T::from_lapack(y)))
        }
    }

    impl From<LinalgError> for SolveError {
        fn from(value: LinalgError) -> SolveError {
            SolveError(value.to_string())
        }
    }
}

#[cfg(feature = "faer-backend")]
pub use faer::FaerBackend;

#[cfg(feature = "faer-backend")]
mod faer {
    use super::*;
    use ::faer::{Mat, linalg::solvers::Solve, traits::RealField};
    use faer_ext::IntoFaer;

    /// faer linear-solve backend.
    ///
    /// This is a backend that uses [`faer`](::faer) to solve dense systems
    /// with a partial-pivoting LU factorization. It is a pure Rust
    /// implementation and the default backend of this crate.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct FaerBackend {}

    /// Marker trait used to mark for which types `T` that have the trait
    /// [`RealField`], the trait `LinearSolverBackend<T>` should be
    /// implemented for `FaerBackend` by doing no scalar type conversion
    /// and using the type `T` natively in [`faer`](::faer).
    ///
    /// A marker trait is needed because `RealField` is defined by an
    /// upstream crate: with a blanket implementation
    ///
    /// ```ignore
    /// impl<T: RealField> LinearSolverBackend<T> for FaerBackend { ... }
    /// ```
    ///
    /// it would not be possible to do specialized implementations for
    /// types `T` that do not implement `RealField` (because at any point
    /// the upstream crate could add an implementation of `RealField` for
    /// these types).
    pub trait IsRealField: RealField {}
    impl IsRealField for f64 {}
    impl IsRealField for f32 {}

    impl<T: IsRealField> LinearSolverBackend<T> for FaerBackend {
        fn solve(&self, matrix: Array2<T>, rhs: Array1<T>) -> Result<Array1<T>> {
            let n = rhs.len();
            let lu = matrix.view().into_faer().partial_piv_lu();
            let rhs = Mat::from_fn(n, 1, |i, _| rhs[i].clone());
            let solution = lu.solve(rhs);
            Ok(Array1::from_iter((0..n).map(|i| solution[(i, 0)].clone())))
        }
    }
}

#[cfg(feature = "nalgebra-backend")]
pub use nalgebra::NalgebraBackend;

#[cfg(feature = "nalgebra-backend")]
mod nalgebra {
    use super::*;
    use ::nalgebra::{DMatrix, DVector, RealField};

    /// nalgebra linear-solve backend.
    ///
    /// This is a backend that uses [`nalgebra`](::nalgebra) to solve dense
    /// systems with an LU factorization. The types natively supported by
    /// `nalgebra` are `f32` and `f64`.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct NalgebraBackend {}

    /// Marker trait used to mark for which types `T` that have the trait
    /// [`RealField`], the trait `LinearSolverBackend<T>` should be
    /// implemented for `NalgebraBackend` by doing no scalar type
    /// conversion and using the type `T` natively in
    /// [`nalgebra`](::nalgebra).
    ///
    /// A marker trait is needed because `RealField` is defined by an
    /// upstream crate: with a blanket implementation
    ///
    /// ```ignore
    /// impl<T: RealField> LinearSolverBackend<T> for NalgebraBackend { ... }
    /// ```
    ///
    /// it would not be possible to do specialized implementations for
    /// types `T` that do not implement `RealField` (because at any point
    /// the upstream crate could add an implementation of `RealField` for
    /// these types).
    pub trait IsRealField: RealField + Copy {}
    impl IsRealField for f64 {}
    impl IsRealField for f32 {}

    impl<T: IsRealField> LinearSolverBackend<T> for NalgebraBackend {
        fn solve(&self, matrix: Array2<T>, rhs: Array1<T>) -> Result<Array1<T>> {
            let n = rhs.len();
            let matrix = DMatrix::from_row_iterator(n, n, matrix);
            let rhs = DVector::from_iterator(n, rhs);
            let solution = matrix
                .lu()
                .solve(&rhs)
                .ok_or_else(|| SolveError("matrix is singular".to_string()))?;
            Ok(Array1::from_iter(solution.iter().copied()))
        }
    }
}

use crate::calculus::{DifferentiableVectorFunction, VectorFunction};
use itertools::iterate;
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut, RealField, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Summary of a successful Newton solve.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NewtonResult<T> {
    /// Number of updates applied to the initial guess.
    pub iterations: usize,
    /// Euclidean norm of the residual at the returned iterate.
    pub residual_norm: T,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonSettings<T> {
    /// `None` iterates until convergence or failure.
    pub max_iterations: Option<usize>,
    /// Absolute tolerance on the Euclidean norm of the residual.
    pub tolerance: T,
}

impl Default for NewtonSettings<f64> {
    fn default() -> Self {
        Self {
            max_iterations: Some(50),
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached { iterations: usize, residual_norm: f64 },
    /// The residual contains NaN or infinite entries, typically due to an inverted element.
    NonFiniteResidual { iterations: usize },
    /// The procedure failed because solving the Jacobian system failed.
    JacobianError(Box<dyn Error>),
    /// The line search failed to produce a valid step direction.
    LineSearchError(Box<dyn Error>),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            NewtonError::MaximumIterationsReached {
                iterations,
                residual_norm,
            } => {
                write!(
                    f,
                    "Failed to converge within maximum number of iterations ({}). Residual norm: {:e}",
                    iterations, residual_norm
                )
            }
            NewtonError::NonFiniteResidual { iterations } => {
                write!(f, "Residual became non-finite after {} iterations.", iterations)
            }
            NewtonError::JacobianError(err) => {
                write!(f, "Failed to solve Jacobian system. Error: {}", err)
            }
            NewtonError::LineSearchError(err) => {
                write!(f, "Line search failed to produce valid step direction. Error: {}", err)
            }
        }
    }
}

impl Error for NewtonError {}

fn to_f64<T: RealField + Copy>(value: T) -> f64 {
    nalgebra::try_convert::<T, f64>(value).unwrap_or(f64::NAN)
}

/// Attempts to solve the non-linear equation F(u) = 0.
///
/// No heap allocation is performed. The solution is said to have converged if
/// ```|F(u)|_2 <= tolerance```. An initial guess that already satisfies the tolerance is
/// returned unchanged with zero iterations.
pub fn newton<'a, T, F>(
    function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<NewtonResult<T>, NewtonError>
where
    T: RealField + Copy,
    F: DifferentiableVectorFunction<T>,
{
    newton_line_search(function, x, f, dx, settings, &mut NoLineSearch {})
}

/// Same as `newton`, but allows specifying a line search.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn newton_line_search<'a, T, F>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
    line_search: &mut impl LineSearch<T, F>,
) -> Result<NewtonResult<T>, NewtonError>
where
    T: RealField + Copy,
    F: DifferentiableVectorFunction<T>,
{
    let mut x = x.into();
    let mut f = f.into();
    let mut minus_dx = dx.into();

    assert_eq!(x.nrows(), f.nrows());
    assert_eq!(minus_dx.nrows(), f.nrows());

    function.eval_into(&mut f, &DVectorView::from(&x));

    let mut iter = 0;

    loop {
        let residual_norm = f.norm();
        debug!("Newton iteration {}: residual norm {:e}", iter, to_f64(residual_norm));

        if !residual_norm.is_finite() {
            return Err(NewtonError::NonFiniteResidual { iterations: iter });
        }
        if residual_norm <= settings.tolerance {
            return Ok(NewtonResult {
                iterations: iter,
                residual_norm,
            });
        }
        if settings
            .max_iterations
            .map(|max_iter| iter >= max_iter)
            .unwrap_or(false)
        {
            return Err(NewtonError::MaximumIterationsReached {
                iterations: iter,
                residual_norm: to_f64(residual_norm),
            });
        }

        // Solve the system J dx = -f   <=>   J (-dx) = f
        function
            .solve_jacobian_system(&mut minus_dx, &DVectorView::from(&x), &DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;

        // Flip sign to make it consistent with line search
        minus_dx *= -1.0;
        let dx = &minus_dx;

        let step_length = line_search
            .step(
                &mut function,
                DVectorViewMut::from(&mut f),
                DVectorViewMut::from(&mut x),
                DVectorView::from(dx),
            )
            .map_err(NewtonError::LineSearchError)?;
        debug!("Newton step length at iter {}: {}", iter, step_length);
        iter += 1;
    }
}

pub trait LineSearch<T: Scalar, F: VectorFunction<T>> {
    /// Update `x` along `direction`, leaving `f` evaluated at the new `x`.
    ///
    /// Returns the accepted step length.
    fn step(
        &mut self,
        function: &mut F,
        f: DVectorViewMut<T>,
        x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error>>;
}

/// Trivial implementation of line search. Equivalent to a single, full Newton step.
#[derive(Clone, Debug)]
pub struct NoLineSearch;

impl<T, F> LineSearch<T, F> for NoLineSearch
where
    T: RealField + Copy,
    F: VectorFunction<T>,
{
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error>> {
        x.axpy(T::one(), &direction, T::one());
        function.eval_into(&mut f, &DVectorView::from(&x));
        Ok(T::one())
    }
}

/// Standard backtracking line search using the Armijo condition.
///
/// See Jorge & Nocedal (2006), Numerical Optimization, Chapter 3.1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktrackingLineSearch {
    /// The constant `c` in the sufficient decrease condition.
    pub sufficient_decrease: f64,
    /// Step lengths below this value are reported as failure.
    pub min_step_length: f64,
}

impl Default for BacktrackingLineSearch {
    fn default() -> Self {
        Self {
            sufficient_decrease: 1e-4,
            min_step_length: 1e-6,
        }
    }
}

impl<T, F> LineSearch<T, F> for BacktrackingLineSearch
where
    T: RealField + Copy,
    F: VectorFunction<T>,
{
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn step(
        &mut self,
        function: &mut F,
        mut f: DVectorViewMut<T>,
        mut x: DVectorViewMut<T>,
        direction: DVectorView<T>,
    ) -> Result<T, Box<dyn Error>> {
        // We seek to solve
        //  F(x) = 0
        // by minimizing
        //  g(x) = (1/2) || F(x) ||^2
        // and, assuming p_k solves the Newton system, the sufficient decrease condition becomes
        //  g(x_k + alpha * p_k) <= (1 - c * alpha) * g(x_k)
        let c = T::from_f64(self.sufficient_decrease).unwrap();
        let alpha_min = T::from_f64(self.min_step_length).unwrap();

        let p = direction;
        let g_initial = 0.5 * f.magnitude_squared();

        // Shrink slowly for the first few trials, then geometrically
        let mut alpha_iter = [1.0, 0.75, 0.5]
            .into_iter()
            .chain(iterate(0.25, |alpha_i| 0.25 * *alpha_i));

        let mut alpha_prev = 0.0;
        loop {
            let alpha = alpha_iter
                .next()
                .expect("Backtracking sequence is infinite");

            // x^{k + 1} = x^k + (alpha^k - alpha^{k - 1}) p
            x.axpy(alpha - alpha_prev, &p, T::one());
            function.eval_into(&mut f, &DVectorView::from(&x));

            let g = 0.5 * f.magnitude_squared();
            if g <= (1.0 - c * alpha) * g_initial {
                return Ok(alpha);
            } else if alpha < alpha_min {
                return Err(Box::from(format!(
                    "Failed to produce valid step direction. \
                    Alpha {} is smaller than minimum allowed alpha {}.",
                    alpha, alpha_min
                )));
            }
            alpha_prev = alpha;
        }
    }
}

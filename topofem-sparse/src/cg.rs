use core::fmt;
use log::debug;
use nalgebra::{ClosedAdd, ClosedMul, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::error::Error;

/// A linear map `x -> A x` on `R^n`.
pub trait LinearOperator<T: Scalar> {
    /// Computes `y = A x`.
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// Adapts a closure `(y, x) -> y = A x` into a [`LinearOperator`].
///
/// This is the entry point for matrix-free operators such as Jacobian-vector products.
pub struct FnOperator<F>(pub F);

impl<F> FnOperator<F> {
    pub fn new<T>(operator: F) -> Self
    where
        T: Scalar,
        F: Fn(DVectorViewMut<T>, DVectorView<T>) -> Result<(), Box<dyn Error>>,
    {
        Self(operator)
    }
}

impl<T, F> LinearOperator<T> for FnOperator<F>
where
    T: Scalar,
    F: Fn(DVectorViewMut<T>, DVectorView<T>) -> Result<(), Box<dyn Error>>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        (self.0)(y, x)
    }
}

/// Relative residual tolerance `||r|| <= tol * ||b||`.
///
/// Uses the recursively updated residual of CG, which may drift from the true residual
/// `b - A x` for ill-conditioned systems.
#[derive(Debug, Clone, Copy)]
pub struct RelativeResidualCriterion<T> {
    tol: T,
}

impl<T> RelativeResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }
}

impl Default for RelativeResidualCriterion<f64> {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl<T: RealField + Copy> RelativeResidualCriterion<T> {
    fn has_converged(&self, b_norm: T, approx_residual: &DVector<T>) -> bool {
        approx_residual.norm() <= self.tol * b_norm
    }
}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CgWorkspace<T: Scalar> {
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    Ap: DVector<T>,
}

impl<T: Scalar + Zero> Default for CgWorkspace<T> {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }
}

impl<T: Scalar + Zero> CgWorkspace<T> {
    fn resize(&mut self, dim: usize) {
        for buffer in [&mut self.r, &mut self.z, &mut self.p, &mut self.Ap] {
            buffer.resize_vertically_mut(dim, T::zero());
        }
    }
}

/// Preconditioned conjugate gradient for symmetric positive definite operators.
///
/// Configured with a builder:
/// ```ignore
/// let output = ConjugateGradient::new()
///     .with_operator(&matrix)
///     .with_preconditioner(&jacobi)
///     .with_stopping_criterion(RelativeResidualCriterion::new(1e-10))
///     .with_max_iter(1000)
///     .solve_with_guess(&b, &mut x)?;
/// ```
#[derive(Debug)]
pub struct ConjugateGradient<T: Scalar, A, P> {
    workspace: CgWorkspace<T>,
    operator: A,
    preconditioner: P,
    stopping_criterion: RelativeResidualCriterion<T>,
    max_iter: Option<usize>,
}

impl ConjugateGradient<f64, (), IdentityOperator> {
    pub fn new() -> Self {
        Self::with_workspace(CgWorkspace::default())
    }
}

impl<T: Scalar> ConjugateGradient<T, (), IdentityOperator>
where
    RelativeResidualCriterion<T>: Default,
{
    pub fn with_workspace(workspace: CgWorkspace<T>) -> Self {
        Self {
            workspace,
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: RelativeResidualCriterion::default(),
            max_iter: None,
        }
    }
}

impl<T: Scalar, P> ConjugateGradient<T, (), P> {
    pub fn with_operator<A>(self, operator: A) -> ConjugateGradient<T, A, P> {
        ConjugateGradient {
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<T: Scalar, A, P> ConjugateGradient<T, A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<T, A, P2> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }

    pub fn with_stopping_criterion(self, stopping_criterion: RelativeResidualCriterion<T>) -> Self {
        Self {
            stopping_criterion,
            ..self
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }

    /// Recover the workspace so that its buffers can be reused by another solver.
    pub fn into_workspace(self) -> CgWorkspace<T> {
        self.workspace
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => write!(f, "Error applying operator: {}", err),
            Self::PreconditionerError(err) => write!(f, "Error applying preconditioner: {}", err),
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite"),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached", max_iter)
            }
        }
    }
}

#[derive(Debug)]
pub struct SolveError {
    pub output: CgOutput,
    pub kind: SolveErrorKind,
}

impl SolveError {
    fn new(output: CgOutput, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CG solve failed after {} iterations. Error: {}",
            self.output.num_iterations, self.kind
        )
    }
}

impl std::error::Error for SolveError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CgOutput {
    /// Number of updates made to the (initial) solution vector.
    pub num_iterations: usize,
}

impl<T, A, P> ConjugateGradient<T, A, P>
where
    T: RealField + Copy,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
{
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<CgOutput, SolveError> {
        let result = self.solve_with_guess_(b.into(), x.into());
        if let Ok(output) = &result {
            debug!("CG converged in {} iterations", output.num_iterations);
        }
        result
    }

    #[allow(non_snake_case)]
    fn solve_with_guess_(&mut self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<CgOutput, SolveError> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let mut output = CgOutput { num_iterations: 0 };

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        self.workspace.resize(x.len());
        let CgWorkspace { r, z, p, Ap } = &mut self.workspace;

        // r = b - Ax
        self.operator
            .apply(DVectorViewMut::from(&mut *r), DVectorView::from(&x))
            .map_err(|err| SolveError::new(output, OperatorError(err)))?;
        r.zip_apply(&b, |Ax_i, b_i| *Ax_i = b_i - *Ax_i);

        // z = Pr
        self.preconditioner
            .apply(DVectorViewMut::from(&mut *z), DVectorView::from(&*r))
            .map_err(|err| SolveError::new(output, PreconditionerError(err)))?;

        p.copy_from(z);
        let mut zTr = z.dot(r);

        loop {
            if self.stopping_criterion.has_converged(b_norm, r) {
                break;
            } else if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            // Ap = A * p
            self.operator
                .apply(DVectorViewMut::from(&mut *Ap), DVectorView::from(&*p))
                .map_err(|err| SolveError::new(output, OperatorError(err)))?;
            let pAp = p.dot(Ap);

            if pAp <= T::zero() {
                return Err(SolveError::new(output, IndefiniteOperator));
            }
            if zTr <= T::zero() {
                return Err(SolveError::new(output, IndefinitePreconditioner));
            }

            let alpha = zTr / pAp;
            x.zip_apply(&*p, |x_i, p_i| *x_i += alpha * p_i);
            r.zip_apply(&*Ap, |r_i, Ap_i| *r_i -= alpha * Ap_i);
            output.num_iterations += 1;

            // z <- P r
            self.preconditioner
                .apply(DVectorViewMut::from(&mut *z), DVectorView::from(&*r))
                .map_err(|err| SolveError::new(output, PreconditionerError(err)))?;
            let zTr_next = z.dot(r);
            let beta = zTr_next / zTr;

            // p <- z + beta * p
            p.zip_apply(&*z, |p_i, z_i| *p_i = z_i + beta * *p_i);

            zTr = zTr_next;
        }

        Ok(output)
    }
}

//! Newton solver for problems reduced to their free degrees of freedom.
use crate::assembly::operators::EllipticOperator;
use crate::boundary::DirichletBoundaryConditions;
use crate::design::QuadratureField;
use crate::error::FemError;
use crate::nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use crate::nalgebra_sparse::factorization::CscCholesky;
use crate::nalgebra_sparse::{CscMatrix, CsrMatrix};
use crate::problem::EllipticProblem;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use topofem_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use topofem_optimize::newton::{
    newton_line_search, BacktrackingLineSearch, LineSearch, NewtonError, NewtonSettings, NoLineSearch,
};
use topofem_sparse::cg::{CgWorkspace, ConjugateGradient, FnOperator, RelativeResidualCriterion};
use topofem_sparse::preconditioners::JacobiPreconditioner;

/// A nonlinear system `R(u) = 0` on all DOFs, of which the Dirichlet-constrained ones are fixed.
pub trait NonlinearProblem: Sync {
    fn num_dofs(&self) -> usize;

    fn dirichlet(&self) -> &DirichletBoundaryConditions;

    fn compute_residual(&self, sol: &DVector<f64>) -> DVector<f64>;

    /// The materialized Jacobian `∂R/∂u`.
    fn newton_update(&self, sol: &DVector<f64>) -> CsrMatrix<f64>;

    fn jacobian_vector_product(&self, sol: &DVector<f64>, v: &DVector<f64>) -> DVector<f64>;

    fn jacobian_diagonal(&self, sol: &DVector<f64>) -> DVector<f64>;
}

/// An [`EllipticProblem`] with its design values fixed.
#[derive(Debug)]
pub struct DesignedProblem<'a, Op, const VEC: usize> {
    problem: &'a EllipticProblem<Op, VEC>,
    thetas: QuadratureField<f64>,
}

impl<'a, Op, const VEC: usize> DesignedProblem<'a, Op, VEC>
where
    Op: EllipticOperator<VEC>,
{
    /// # Panics
    ///
    /// Panics if `thetas` does not have one value per quadrature point of the problem.
    pub fn new(problem: &'a EllipticProblem<Op, VEC>, thetas: QuadratureField<f64>) -> Self {
        assert_eq!(thetas.num_cells(), problem.num_cells());
        assert_eq!(thetas.num_quads(), problem.num_quads());
        Self { problem, thetas }
    }

    pub fn thetas(&self) -> &QuadratureField<f64> {
        &self.thetas
    }
}

impl<'a, Op, const VEC: usize> NonlinearProblem for DesignedProblem<'a, Op, VEC>
where
    Op: EllipticOperator<VEC>,
{
    fn num_dofs(&self) -> usize {
        self.problem.num_dofs()
    }

    fn dirichlet(&self) -> &DirichletBoundaryConditions {
        self.problem.dirichlet()
    }

    fn compute_residual(&self, sol: &DVector<f64>) -> DVector<f64> {
        self.problem.compute_residual(sol, &self.thetas)
    }

    fn newton_update(&self, sol: &DVector<f64>) -> CsrMatrix<f64> {
        self.problem.newton_update(sol, &self.thetas)
    }

    fn jacobian_vector_product(&self, sol: &DVector<f64>, v: &DVector<f64>) -> DVector<f64> {
        self.problem.jacobian_vector_product(sol, &self.thetas, v)
    }

    fn jacobian_diagonal(&self, sol: &DVector<f64>) -> DVector<f64> {
        self.problem.jacobian_diagonal(sol, &self.thetas)
    }
}

/// Method used for the linear system of each Newton iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinearSolver {
    /// Sparse Cholesky factorization. Falls back to dense LU when the Jacobian is not
    /// positive definite.
    SparseCholesky,
    /// Dense LU factorization with partial pivoting. Only suitable for small systems.
    DenseLu,
    /// Jacobi-preconditioned conjugate gradient on matrix-free Jacobian-vector products.
    ConjugateGradient {
        /// Relative residual tolerance.
        tolerance: f64,
        max_iterations: Option<usize>,
    },
}

impl Default for LinearSolver {
    fn default() -> Self {
        Self::SparseCholesky
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineSearchKind {
    /// Always take the full Newton step.
    None,
    Backtracking(BacktrackingLineSearch),
}

impl Default for LineSearchKind {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SolverSettings {
    pub newton: NewtonSettings<f64>,
    pub linear_solver: LinearSolver,
    pub line_search: LineSearchKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutput {
    /// The full solution, including the prescribed Dirichlet values.
    pub solution: DVector<f64>,
    /// Number of Newton updates applied to the initial guess.
    pub iterations: usize,
    /// Euclidean norm of the residual on the free DOFs at the returned solution.
    pub residual_norm: f64,
}

#[derive(Debug)]
pub enum SolveError {
    /// The problem or the initial guess is malformed.
    Setup(FemError),
    /// Newton's method failed. Non-convergence carries the iteration count and residual norm.
    Newton(NewtonError),
}

impl Display for SolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(err) => write!(f, "Invalid problem setup: {err}"),
            Self::Newton(err) => write!(f, "Nonlinear solve failed: {err}"),
        }
    }
}

impl Error for SolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Setup(err) => Some(err),
            Self::Newton(err) => Some(err),
        }
    }
}

impl From<FemError> for SolveError {
    fn from(err: FemError) -> Self {
        Self::Setup(err)
    }
}

impl From<NewtonError> for SolveError {
    fn from(err: NewtonError) -> Self {
        Self::Newton(err)
    }
}

/// The residual restricted to the free DOFs, as a function of the free DOFs alone.
struct ReducedSystem<'a, P> {
    problem: &'a P,
    linear_solver: &'a LinearSolver,
    cg_workspace: CgWorkspace<f64>,
}

impl<'a, P: NonlinearProblem> ReducedSystem<'a, P> {
    fn full_solution(&self, x: &DVectorView<f64>) -> DVector<f64> {
        self.problem.dirichlet().expand(&x.clone_owned())
    }

    /// Solves `J_ff s = rhs` for the Jacobian at the full solution `u`.
    fn solve_linearized(&mut self, u: &DVector<f64>, rhs: &DVectorView<f64>) -> Result<DVector<f64>, Box<dyn Error>> {
        match self.linear_solver {
            LinearSolver::SparseCholesky => self.solve_cholesky(u, rhs),
            LinearSolver::DenseLu => self.solve_dense_lu(u, rhs),
            LinearSolver::ConjugateGradient {
                tolerance,
                max_iterations,
            } => {
                let (tolerance, max_iterations) = (*tolerance, *max_iterations);
                self.solve_cg(u, rhs, tolerance, max_iterations)
            }
        }
    }

    fn solve_cholesky(&self, u: &DVector<f64>, rhs: &DVectorView<f64>) -> Result<DVector<f64>, Box<dyn Error>> {
        let dirichlet = self.problem.dirichlet();
        let jacobian = dirichlet.restrict_matrix(&self.problem.newton_update(u));
        match CscCholesky::factor(&CscMatrix::from(&jacobian)) {
            Ok(factorization) => {
                let solution = factorization.solve(&rhs.clone_owned());
                Ok(solution.column(0).clone_owned())
            }
            Err(err) => {
                warn!("Sparse Cholesky factorization failed ({err:?}), falling back to dense LU");
                dense_lu_solve(&jacobian, rhs)
            }
        }
    }

    fn solve_dense_lu(&self, u: &DVector<f64>, rhs: &DVectorView<f64>) -> Result<DVector<f64>, Box<dyn Error>> {
        let dirichlet = self.problem.dirichlet();
        dense_lu_solve(&dirichlet.restrict_matrix(&self.problem.newton_update(u)), rhs)
    }

    fn solve_cg(
        &mut self,
        u: &DVector<f64>,
        rhs: &DVectorView<f64>,
        tolerance: f64,
        max_iterations: Option<usize>,
    ) -> Result<DVector<f64>, Box<dyn Error>> {
        let problem = self.problem;
        let dirichlet = problem.dirichlet();
        let diagonal = dirichlet.restrict(&problem.jacobian_diagonal(u));
        let preconditioner = JacobiPreconditioner::from_diagonal(&diagonal)
            .ok_or("Jacobian diagonal is not positive, so the Jacobian is not positive definite")?;
        let operator = FnOperator::new(|mut y: DVectorViewMut<f64>, x: DVectorView<f64>| {
            let direction = dirichlet.expand_homogeneous(&x.clone_owned());
            y.copy_from(&dirichlet.restrict(&problem.jacobian_vector_product(u, &direction)));
            Ok(())
        });

        let mut solution = DVector::zeros(rhs.len());
        let mut cg = ConjugateGradient::with_workspace(std::mem::take(&mut self.cg_workspace))
            .with_operator(operator)
            .with_preconditioner(preconditioner)
            .with_stopping_criterion(RelativeResidualCriterion::new(tolerance));
        if let Some(max_iter) = max_iterations {
            cg = cg.with_max_iter(max_iter);
        }
        let result = cg.solve_with_guess(rhs, &mut solution);
        self.cg_workspace = cg.into_workspace();
        let output = result?;
        debug!("CG solved the Newton system in {} iterations", output.num_iterations);
        Ok(solution)
    }
}

impl<'a, P: NonlinearProblem> VectorFunction<f64> for ReducedSystem<'a, P> {
    fn dimension(&self) -> usize {
        self.problem.dirichlet().num_free_dofs()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        let u = self.full_solution(x);
        let residual = self.problem.compute_residual(&u);
        f.copy_from(&self.problem.dirichlet().restrict(&residual));
    }
}

impl<'a, P: NonlinearProblem> DifferentiableVectorFunction<f64> for ReducedSystem<'a, P> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), Box<dyn Error>> {
        let u = self.full_solution(x);
        sol.copy_from(&self.solve_linearized(&u, rhs)?);
        Ok(())
    }
}

fn dense_lu_solve(jacobian: &CsrMatrix<f64>, rhs: &DVectorView<f64>) -> Result<DVector<f64>, Box<dyn Error>> {
    DMatrix::from(jacobian)
        .lu()
        .solve(&rhs.clone_owned())
        .ok_or_else(|| Box::from("Jacobian is singular"))
}

/// Moves the constrained entries of `u` by `lifting` and corrects the free entries with one
/// linearized step, `J_ff δ = -(R_f(u) + J_fc Δu_c)`.
fn predict_dirichlet_lifting<P: NonlinearProblem>(
    system: &mut ReducedSystem<P>,
    u: &mut DVector<f64>,
    lifting: &DVector<f64>,
) -> Result<(), NewtonError> {
    let problem = system.problem;
    let dirichlet = problem.dirichlet();
    let linearized = problem.compute_residual(u) + problem.jacobian_vector_product(u, lifting);
    let rhs = dirichlet.restrict(&linearized);
    if !rhs.iter().all(|r| r.is_finite()) {
        return Err(NewtonError::NonFiniteResidual { iterations: 0 });
    }
    let correction = system
        .solve_linearized(u, &DVectorView::from(&rhs))
        .map_err(NewtonError::JacobianError)?;
    *u += lifting;
    *u -= dirichlet.expand_homogeneous(&correction);
    dirichlet.apply(u);
    Ok(())
}

/// Adds the iterations spent before Newton's method started to the count in `err`.
fn offset_iterations(err: NewtonError, offset: usize) -> NewtonError {
    match err {
        NewtonError::MaximumIterationsReached {
            iterations,
            residual_norm,
        } => NewtonError::MaximumIterationsReached {
            iterations: iterations + offset,
            residual_norm,
        },
        NewtonError::NonFiniteResidual { iterations } => NewtonError::NonFiniteResidual {
            iterations: iterations + offset,
        },
        err => err,
    }
}

fn run_newton<F, L>(
    system: F,
    x: &mut DVector<f64>,
    settings: &NewtonSettings<f64>,
    line_search: &mut L,
) -> Result<usize, NewtonError>
where
    F: DifferentiableVectorFunction<f64>,
    L: LineSearch<f64, F>,
{
    let n = x.len();
    let mut f = DVector::zeros(n);
    let mut dx = DVector::zeros(n);
    newton_line_search(system, x, &mut f, &mut dx, *settings, line_search).map(|result| result.iterations)
}

/// Solves `R(u) = 0` with Newton's method in the space of free DOFs.
///
/// The initial guess defaults to zero. When its constrained entries differ from the prescribed
/// Dirichlet values, the first iteration is a linearized predictor: the prescribed values are
/// imposed and the free DOFs are corrected with the tangent at the initial guess. The
/// constrained entries are never modified afterwards.
pub fn solve<P: NonlinearProblem>(
    problem: &P,
    initial_guess: Option<&DVector<f64>>,
    settings: &SolverSettings,
) -> Result<SolveOutput, SolveError> {
    let dirichlet = problem.dirichlet();
    let mut u = match initial_guess {
        Some(guess) if guess.len() != problem.num_dofs() => {
            return Err(FemError::DimensionMismatch {
                what: "initial guess",
                expected: problem.num_dofs(),
                actual: guess.len(),
            }
            .into());
        }
        Some(guess) => guess.clone(),
        None => DVector::zeros(problem.num_dofs()),
    };

    info!(
        "Starting Newton solve: {} free DOFs, linear solver {:?}",
        dirichlet.num_free_dofs(),
        settings.linear_solver
    );

    let mut system = ReducedSystem {
        problem,
        linear_solver: &settings.linear_solver,
        cg_workspace: CgWorkspace::default(),
    };

    let mut lifting = DVector::zeros(problem.num_dofs());
    for &(dof, value) in dirichlet.constrained() {
        lifting[dof] = value - u[dof];
    }
    let mut newton_settings = settings.newton;
    let needs_predictor = lifting.iter().any(|&l| l != 0.0);
    let predictor_iterations = if needs_predictor && newton_settings.max_iterations != Some(0) {
        predict_dirichlet_lifting(&mut system, &mut u, &lifting).map_err(|err| {
            warn!("Dirichlet predictor failed: {err}");
            SolveError::Newton(err)
        })?;
        debug!("Applied linearized Dirichlet predictor, lifting norm {:e}", lifting.norm());
        newton_settings.max_iterations = newton_settings.max_iterations.map(|max_iter| max_iter - 1);
        1
    } else {
        dirichlet.apply(&mut u);
        0
    };
    let mut x = dirichlet.restrict(&u);

    let result = match &settings.line_search {
        LineSearchKind::None => run_newton(&mut system, &mut x, &newton_settings, &mut NoLineSearch),
        LineSearchKind::Backtracking(line_search) => {
            run_newton(&mut system, &mut x, &newton_settings, &mut line_search.clone())
        }
    };

    let iterations = result.map(|iterations| iterations + predictor_iterations).map_err(|err| {
        let err = offset_iterations(err, predictor_iterations);
        warn!("Newton solve failed: {err}");
        SolveError::Newton(err)
    })?;

    let solution = dirichlet.expand(&x);
    let residual_norm = dirichlet.restrict(&problem.compute_residual(&solution)).norm();
    info!(
        "Newton converged after {} iterations, residual norm {:e}",
        iterations, residual_norm
    );
    Ok(SolveOutput {
        solution,
        iterations,
        residual_norm,
    })
}

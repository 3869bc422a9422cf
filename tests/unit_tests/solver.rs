use crate::unit_tests::{distorted_unit_cube_mesh, laplace_problem, on_cube_boundary};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, Point3, SMatrix, Vector1, Vector3};
use rayon::ThreadPoolBuilder;
use topofem::assembly::operators::{EllipticOperator, LaplaceOperator};
use topofem::boundary::{BodyForce, BoundaryConditions, DirichletBc};
use topofem::error::FemError;
use topofem::mesh::procedural::create_unit_box_uniform_hex_mesh;
use topofem::optimize::newton::{NewtonError, NewtonSettings};
use topofem::problem::EllipticProblem;
use topofem::solver::{solve, LineSearchKind, LinearSolver, SolveError, SolverSettings};
use topofem::Real;

/// Diffusion whose conductivity grows with the gradient, `σ = θ (1 + |∇u|²) ∇u`.
struct GradientDependentDiffusion;

impl EllipticOperator<1> for GradientDependentDiffusion {
    fn compute_elliptic_term<T: Real>(&self, gradient: &SMatrix<T, 1, 3>, theta: T) -> SMatrix<T, 1, 3> {
        let norm_squared = gradient.iter().fold(T::zero(), |acc, &g| acc + g * g);
        gradient * (theta * (T::one() + norm_squared))
    }
}

fn settings(linear_solver: LinearSolver) -> SolverSettings {
    SolverSettings {
        newton: NewtonSettings {
            max_iterations: Some(20),
            tolerance: 1e-10,
        },
        linear_solver,
        ..Default::default()
    }
}

fn affine(x: &Point3<f64>) -> f64 {
    Vector3::new(1.0, 0.5, -0.3).dot(&x.coords) + 0.25
}

fn affine_dirichlet() -> BoundaryConditions<1> {
    BoundaryConditions::new().with_dirichlet(DirichletBc::new(on_cube_boundary, 0, affine))
}

/// Homogeneous Dirichlet values on the boundary of the unit cube, with a smooth source.
fn poisson_problem(cells_per_dim: usize) -> EllipticProblem<LaplaceOperator, 1> {
    let conditions = BoundaryConditions::new()
        .with_dirichlet(DirichletBc::constant(on_cube_boundary, 0, 0.0))
        .with_body_force(BodyForce::new(|x| Vector1::new(1.0 + x.x * x.y)));
    laplace_problem(create_unit_box_uniform_hex_mesh(cells_per_dim), conditions)
}

#[test]
fn affine_dirichlet_data_is_reproduced_in_one_iteration() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), affine_dirichlet());
    let output = solve(
        &problem.with_thetas(problem.full_material()),
        None,
        &settings(LinearSolver::SparseCholesky),
    )
    .unwrap();

    assert_eq!(output.iterations, 1);
    assert!(output.residual_norm <= 1e-10);
    let expected = DVector::from_iterator(problem.num_dofs(), problem.mesh().vertices().iter().map(affine));
    assert_matrix_eq!(output.solution, expected, comp = abs, tol = 1e-12);
}

#[test]
fn problem_without_load_needs_no_iterations() {
    let conditions = BoundaryConditions::new().with_dirichlet(DirichletBc::constant(on_cube_boundary, 0, 0.0));
    let problem = laplace_problem(create_unit_box_uniform_hex_mesh(2), conditions);
    let output = solve(&problem.with_thetas(problem.full_material()), None, &SolverSettings::default()).unwrap();
    assert_eq!(output.iterations, 0);
    assert_eq!(output.residual_norm, 0.0);
    assert_eq!(output.solution, DVector::zeros(problem.num_dofs()));
}

#[test]
fn iteration_limit_is_reported() {
    let problem = poisson_problem(3);
    let mut settings = settings(LinearSolver::SparseCholesky);
    settings.newton.max_iterations = Some(0);
    let result = solve(&problem.with_thetas(problem.full_material()), None, &settings);
    match result {
        Err(SolveError::Newton(NewtonError::MaximumIterationsReached {
            iterations,
            residual_norm,
        })) => {
            assert_eq!(iterations, 0);
            assert!(residual_norm > 0.0);
        }
        other => panic!("Expected iteration limit to be reached, got {other:?}"),
    }
}

#[test]
fn non_finite_residual_is_reported() {
    let conditions = BoundaryConditions::new()
        .with_dirichlet(DirichletBc::constant(on_cube_boundary, 0, 0.0))
        .with_body_force(BodyForce::new(|_| Vector1::new(f64::NAN)));
    let problem = laplace_problem(create_unit_box_uniform_hex_mesh(2), conditions);
    let result = solve(&problem.with_thetas(problem.full_material()), None, &SolverSettings::default());
    assert!(matches!(
        result,
        Err(SolveError::Newton(NewtonError::NonFiniteResidual { iterations: 0 }))
    ));
}

#[test]
fn linear_solvers_agree() {
    let problem = poisson_problem(3);
    let designed = problem.with_thetas(problem.full_material());

    let cholesky = solve(&designed, None, &settings(LinearSolver::SparseCholesky)).unwrap();
    let lu = solve(&designed, None, &settings(LinearSolver::DenseLu)).unwrap();
    let cg = solve(
        &designed,
        None,
        &settings(LinearSolver::ConjugateGradient {
            tolerance: 1e-12,
            max_iterations: Some(1000),
        }),
    )
    .unwrap();

    assert_eq!(cholesky.iterations, 1);
    assert_matrix_eq!(lu.solution, cholesky.solution, comp = abs, tol = 1e-12);
    assert_matrix_eq!(cg.solution, cholesky.solution, comp = abs, tol = 1e-10);

    assert!(cholesky.solution.max() > 0.0);
}

#[test]
fn initial_guess_is_validated_and_constrained() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), affine_dirichlet());
    let designed = problem.with_thetas(problem.full_material());
    let settings = settings(LinearSolver::SparseCholesky);

    let short = DVector::zeros(problem.num_dofs() - 1);
    let error = solve(&designed, Some(&short), &settings).unwrap_err();
    assert!(matches!(
        error,
        SolveError::Setup(FemError::DimensionMismatch {
            expected: 27,
            actual: 26,
            ..
        })
    ));

    // The boundary entries of the guess are wrong, so the solve starts with a predictor step
    let mut guess = DVector::repeat(problem.num_dofs(), 100.0);
    guess[13] = affine(&problem.mesh().vertices()[13]);
    let output = solve(&designed, Some(&guess), &settings).unwrap();
    assert_eq!(output.iterations, 1);
    for &(dof, value) in problem.dirichlet().constrained() {
        assert_eq!(output.solution[dof], value);
    }
    assert_scalar_eq!(output.solution[13], guess[13], comp = abs, tol = 1e-12);

    // An exact guess is returned as is
    let exact = DVector::from_iterator(problem.num_dofs(), problem.mesh().vertices().iter().map(affine));
    let output = solve(&designed, Some(&exact), &settings).unwrap();
    assert_eq!(output.iterations, 0);
    assert_eq!(output.solution, exact);
}

#[test]
fn nonlinear_operator_converges_to_affine_solution() {
    let problem = EllipticProblem::new(distorted_unit_cube_mesh(), GradientDependentDiffusion, affine_dirichlet()).unwrap();
    let designed = problem.with_thetas(problem.full_material());
    let expected = affine(&problem.mesh().vertices()[13]);

    // The guess satisfies the Dirichlet data, so every iteration is a plain Newton step
    let mut guess = DVector::from_iterator(problem.num_dofs(), problem.mesh().vertices().iter().map(affine));
    guess[13] = 0.0;
    let output = solve(&designed, Some(&guess), &settings(LinearSolver::SparseCholesky)).unwrap();
    assert!(output.iterations > 1);
    assert_scalar_eq!(output.solution[13], expected, comp = abs, tol = 1e-10);

    // From zero, the tangent is the Laplacian and the predictor lands on the affine field
    let output = solve(&designed, None, &settings(LinearSolver::SparseCholesky)).unwrap();
    assert_eq!(output.iterations, 1);
    assert_scalar_eq!(output.solution[13], expected, comp = abs, tol = 1e-10);
}

#[test]
fn predictor_counts_towards_iteration_limit() {
    let problem = EllipticProblem::new(distorted_unit_cube_mesh(), GradientDependentDiffusion, affine_dirichlet()).unwrap();
    let designed = problem.with_thetas(problem.full_material().map(|theta| 2.0 * theta));
    let conditions = affine_dirichlet().with_body_force(BodyForce::new(|x| Vector1::new(5.0 * x.x)));
    let loaded = EllipticProblem::new(distorted_unit_cube_mesh(), GradientDependentDiffusion, conditions).unwrap();
    let loaded_designed = loaded.with_thetas(loaded.full_material());

    let mut settings = settings(LinearSolver::SparseCholesky);
    settings.newton.max_iterations = Some(1);
    // The predictor alone solves the unloaded problem
    assert_eq!(solve(&designed, None, &settings).unwrap().iterations, 1);
    // With a load the nonlinearity is felt, and the single allowed iteration is the predictor
    match solve(&loaded_designed, None, &settings) {
        Err(SolveError::Newton(NewtonError::MaximumIterationsReached {
            iterations,
            residual_norm,
        })) => {
            assert_eq!(iterations, 1);
            assert!(residual_norm > 1e-10);
        }
        other => panic!("Expected iteration limit to be reached, got {other:?}"),
    }
}

#[test]
fn indefinite_jacobian_falls_back_to_dense_lu() {
    let problem = poisson_problem(3);
    let positive = solve(
        &problem.with_thetas(problem.full_material()),
        None,
        &settings(LinearSolver::SparseCholesky),
    )
    .unwrap();

    // A negative design makes the Jacobian negative definite, which Cholesky cannot factor
    let negative = problem.with_thetas(problem.full_material().map(|theta: f64| -theta));
    let output = solve(&negative, None, &settings(LinearSolver::SparseCholesky)).unwrap();
    assert_eq!(output.iterations, 1);
    assert_matrix_eq!(output.solution, -&positive.solution, comp = abs, tol = 1e-12);
}

#[test]
fn settings_deserialize_from_json() {
    let json = r#"{
        "newton": { "max_iterations": 20, "tolerance": 1e-10 },
        "linear_solver": { "ConjugateGradient": { "tolerance": 1e-12, "max_iterations": null } },
        "line_search": { "Backtracking": { "sufficient_decrease": 1e-4, "min_step_length": 1e-6 } }
    }"#;
    let settings: SolverSettings = serde_json::from_str(json).unwrap();
    assert_eq!(settings.newton.max_iterations, Some(20));
    assert_eq!(settings.newton.tolerance, 1e-10);
    assert_eq!(
        settings.linear_solver,
        LinearSolver::ConjugateGradient {
            tolerance: 1e-12,
            max_iterations: None
        }
    );
    assert!(matches!(settings.line_search, LineSearchKind::Backtracking(_)));

    let default_json = serde_json::to_string(&SolverSettings::default()).unwrap();
    let default: SolverSettings = serde_json::from_str(&default_json).unwrap();
    assert_eq!(default, SolverSettings::default());
    assert_eq!(default.linear_solver, LinearSolver::SparseCholesky);
    assert!(matches!(default.line_search, LineSearchKind::None));
}

#[test]
fn assembly_does_not_depend_on_thread_count() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
    let thetas = problem.full_material();
    let u = DVector::from_iterator(
        problem.num_dofs(),
        problem.mesh().vertices().iter().map(|x| (2.0 * x.x).sin() * x.y + x.z.powi(3)),
    );

    let assemble = |num_threads: usize| {
        let pool = ThreadPoolBuilder::new().num_threads(num_threads).build().unwrap();
        pool.install(|| (problem.compute_residual(&u, &thetas), problem.newton_update(&u, &thetas)))
    };
    let (residual_serial, jacobian_serial) = assemble(1);
    let (residual_parallel, jacobian_parallel) = assemble(4);

    assert_eq!(residual_serial, residual_parallel);
    assert_eq!(jacobian_serial.row_offsets(), jacobian_parallel.row_offsets());
    assert_eq!(jacobian_serial.col_indices(), jacobian_parallel.col_indices());
    assert_eq!(jacobian_serial.values(), jacobian_parallel.values());
}

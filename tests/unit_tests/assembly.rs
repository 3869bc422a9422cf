use crate::unit_tests::{distorted_unit_cube_mesh, laplace_problem, on_cube_boundary};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Point3, SVector, Vector1};
use proptest::prelude::*;
use topofem::boundary::{BodyForce, BoundaryConditions, NeumannBc};
use topofem::design::{DesignField, QuadratureField};
use topofem::mesh::procedural::create_rectangular_uniform_hex_mesh;
use topofem::optimize::calculus::{approximate_gradient_fd, approximate_jacobian_fd};
use topofem::Dual;

fn on_right(x: &Point3<f64>) -> bool {
    (x.x - 1.0).abs() < 1e-12
}

/// Nodal values of a smooth, non-polynomial field.
fn smooth_field(vertices: &[Point3<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        vertices.len(),
        vertices
            .iter()
            .map(|x| (1.3 * x.x).sin() + x.y * x.z.exp() - 0.5 * x.z * x.z),
    )
}

fn varying_thetas(num_cells: usize, num_quads: usize) -> QuadratureField<f64> {
    let cell_values: Vec<f64> = (0..num_cells)
        .map(|cell| 0.5 + 0.4 * (cell as f64 * 1.37).sin())
        .collect();
    QuadratureField::from_cell_values(&cell_values, num_quads)
}

#[test]
fn affine_field_has_zero_interior_residual() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
    let u = DVector::from_iterator(
        problem.num_dofs(),
        problem
            .mesh()
            .vertices()
            .iter()
            .map(|x| 2.0 * x.x - x.y + 0.5 * x.z + 3.0),
    );
    let residual = problem.compute_residual(&u, &problem.full_material());

    // Only the center vertex is interior
    assert_scalar_eq!(residual[13], 0.0, comp = abs, tol = 1e-12);
    // The fluxes through the boundary balance
    assert_scalar_eq!(residual.sum(), 0.0, comp = abs, tol = 1e-12);

    // A constant field carries no flux at all
    let constant = DVector::repeat(problem.num_dofs(), 4.0);
    let residual = problem.compute_residual(&constant, &problem.full_material());
    assert_matrix_eq!(residual, DVector::zeros(problem.num_dofs()), comp = abs, tol = 1e-12);
}

#[test]
fn jacobian_matches_finite_differences() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
    let thetas = varying_thetas(problem.num_cells(), problem.num_quads());
    let mut u = smooth_field(problem.mesh().vertices());

    let jacobian = DMatrix::from(&problem.newton_update(&u, &thetas));
    assert_eq!(jacobian.shape(), (27, 27));
    assert_matrix_eq!(jacobian, jacobian.transpose(), comp = abs, tol = 1e-12);

    let jacobian_fd = approximate_jacobian_fd(
        problem.num_dofs(),
        |x: DVectorView<f64>, mut r: DVectorViewMut<f64>| {
            r.copy_from(&problem.compute_residual(&x.clone_owned(), &thetas));
        },
        &mut u,
        1e-6,
    );
    assert_matrix_eq!(jacobian, jacobian_fd, comp = abs, tol = 1e-7);
}

#[test]
fn jacobian_vector_product_and_diagonal_match_matrix() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
    let thetas = varying_thetas(problem.num_cells(), problem.num_quads());
    let u = smooth_field(problem.mesh().vertices());
    let v = DVector::from_fn(problem.num_dofs(), |i, _| ((i * 7) % 5) as f64 - 2.0);

    let jacobian = DMatrix::from(&problem.newton_update(&u, &thetas));
    let jvp = problem.jacobian_vector_product(&u, &thetas, &v);
    assert_matrix_eq!(jvp, &jacobian * &v, comp = abs, tol = 1e-12);

    let diagonal = problem.jacobian_diagonal(&u, &thetas);
    assert_matrix_eq!(diagonal, jacobian.diagonal(), comp = abs, tol = 1e-12);
    assert!(diagonal.iter().all(|&d| d > 0.0));
}

#[test]
fn generic_residual_on_dual_numbers_gives_directional_derivative() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
    let thetas = varying_thetas(problem.num_cells(), problem.num_quads());
    let u = smooth_field(problem.mesh().vertices());
    let v = DVector::from_fn(problem.num_dofs(), |i, _| (i as f64 * 0.3).cos());

    let u_dual: Vec<Dual<f64>> = u.iter().zip(v.iter()).map(|(&u, &v)| Dual::new(u, v)).collect();
    let thetas_dual = thetas.map(Dual::<f64>::constant);
    let residual_dual = problem.compute_residual_generic(&u_dual, &thetas_dual);

    let residual = problem.compute_residual(&u, &thetas);
    assert_matrix_eq!(residual_dual.map(|r| r.re), residual, comp = abs, tol = 1e-14);
    let jvp = problem.jacobian_vector_product(&u, &thetas, &v);
    assert_matrix_eq!(residual_dual.map(|r| r.eps), jvp, comp = abs, tol = 1e-12);
}

#[test]
fn design_vjp_matches_finite_differences() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
    let u = smooth_field(problem.mesh().vertices());
    let adjoint = DVector::from_fn(problem.num_dofs(), |i, _| 1.0 + (i % 4) as f64);
    let design = DesignField::new(DVector::from_vec(vec![0.2, 0.6, 0.9]), vec![5, 0, 3]).unwrap();

    let vjp = problem.residual_design_vjp(&u, &design, &adjoint).unwrap();
    assert_eq!(vjp.len(), 3);

    let objective = |p: DVectorView<f64>| {
        let design = design.with_params(p.clone_owned()).unwrap();
        let thetas = problem.set_params(&design).unwrap();
        adjoint.dot(&problem.compute_residual(&u, &thetas))
    };
    let mut p = design.params().clone();
    let vjp_fd = approximate_gradient_fd(objective, &mut p, 1e-6);
    assert_matrix_eq!(vjp, vjp_fd, comp = abs, tol = 1e-7);

    let short_adjoint = DVector::zeros(3);
    assert!(problem.residual_design_vjp(&u, &design, &short_adjoint).is_err());
}

#[test]
fn neumann_load_sums_to_total_traction() {
    let conditions = BoundaryConditions::new().with_neumann(NeumannBc::new(on_right, |_| Vector1::new(2.0)));
    let problem = laplace_problem(distorted_unit_cube_mesh(), conditions);
    assert_eq!(problem.neumann_faces().len(), 1);
    assert_eq!(problem.neumann_faces()[0].len(), 4);

    let load = problem.external_load();
    assert_scalar_eq!(load.sum(), 2.0, comp = abs, tol = 1e-13);
    // Only the nine vertices on x = 1 are loaded
    let loaded = load.iter().filter(|&&f| f != 0.0).count();
    assert_eq!(loaded, 9);

    // The load enters the residual with a negative sign
    let residual = problem.compute_residual(&DVector::zeros(problem.num_dofs()), &problem.full_material());
    assert_matrix_eq!(residual, -load, comp = abs, tol = 1e-14);
}

#[test]
fn body_force_load_sums_to_integral() {
    let conditions = BoundaryConditions::new().with_body_force(BodyForce::new(|x| Vector1::new(1.0 + x.z)));
    let problem = laplace_problem(distorted_unit_cube_mesh(), conditions);
    // ∫ (1 + z) dV over the unit cube
    assert_scalar_eq!(problem.external_load().sum(), 1.5, comp = abs, tol = 1e-13);
}

#[test]
fn compliance_of_linear_field() {
    let conditions = BoundaryConditions::new().with_neumann(NeumannBc::new(on_right, |_| Vector1::new(1.0)));
    let problem = laplace_problem(distorted_unit_cube_mesh(), conditions);
    let u = DVector::from_iterator(problem.num_dofs(), problem.mesh().vertices().iter().map(|x| x.x));

    assert_scalar_eq!(problem.compute_compliance(|_| Vector1::new(1.0), &u), 1.0, comp = abs, tol = 1e-13);
    // Linear in the traction
    let compliance = problem.compute_compliance(|x| Vector1::new(3.0 * x.y), &u);
    assert_scalar_eq!(compliance, 1.5, comp = abs, tol = 1e-13);
    // Equal to the work of the assembled load
    assert_scalar_eq!(
        problem.compute_compliance(|_| Vector1::new(1.0), &u),
        problem.external_load().dot(&u),
        comp = abs,
        tol = 1e-13
    );
}

#[test]
fn compliance_covers_union_of_neumann_faces() {
    let on_back = |x: &Point3<f64>| (x.y - 1.0).abs() < 1e-12;
    let unit = |_: &Point3<f64>| Vector1::new(1.0);
    let conditions = BoundaryConditions::new()
        .with_neumann(NeumannBc::new(on_right, unit))
        .with_neumann(NeumannBc::new(on_back, unit));
    let problem = laplace_problem(distorted_unit_cube_mesh(), conditions);
    let u = DVector::from_iterator(
        problem.num_dofs(),
        problem.mesh().vertices().iter().map(|x| 1.0 + x.x + 2.0 * x.y),
    );

    // ∫ u over x = 1 is 3 and over y = 1 is 3.5
    assert_scalar_eq!(problem.compute_compliance(unit, &u), 6.5, comp = abs, tol = 1e-12);

    // A face selected by several conditions is counted once
    let overlapping = BoundaryConditions::new()
        .with_neumann(NeumannBc::new(on_right, unit))
        .with_neumann(NeumannBc::new(on_back, unit))
        .with_neumann(NeumannBc::new(on_right, unit));
    let problem = laplace_problem(distorted_unit_cube_mesh(), overlapping);
    assert_scalar_eq!(problem.compute_compliance(unit, &u), 6.5, comp = abs, tol = 1e-12);
}

#[test]
fn traction_of_linear_field() {
    let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
    let u = DVector::from_iterator(problem.num_dofs(), problem.mesh().vertices().iter().map(|x| x.x));
    let thetas = QuadratureField::uniform(problem.num_cells(), problem.num_quads(), 0.5);

    let traction = problem.compute_traction(on_right, &u, &thetas);
    assert_scalar_eq!(traction[0], 0.5, comp = abs, tol = 1e-12);

    // The flux leaves through x = 1 and enters through x = 0
    let inflow = problem.compute_traction(|x| x.x.abs() < 1e-12, &u, &thetas);
    assert_scalar_eq!(inflow[0], -0.5, comp = abs, tol = 1e-12);
    let total = problem.compute_traction(on_cube_boundary, &u, &thetas);
    assert_scalar_eq!(total[0], 0.0, comp = abs, tol = 1e-12);
}

#[test]
fn face_quadrature_queries() {
    let mesh = create_rectangular_uniform_hex_mesh(1.0, 2, 1, 1, 2);
    let problem = laplace_problem(mesh, BoundaryConditions::new());
    let faces = problem.boundary_faces(|x| (x.z - 1.0).abs() < 1e-12);
    assert_eq!(faces.len(), 8);

    let (gradients, scales) = problem.get_face_shape_grads(&faces);
    let points = problem.physical_surface_quad_points(&faces);
    assert_eq!(gradients.len(), faces.len());
    assert_eq!(scales.len(), faces.len());
    assert_eq!(points.len(), faces.len());
    for ((g, s), x) in gradients.iter().zip(&scales).zip(&points) {
        assert_eq!(g.len(), problem.num_face_quads());
        assert_eq!(s.len(), problem.num_face_quads());
        assert_eq!(x.len(), problem.num_face_quads());
        assert_scalar_eq!(s.iter().sum::<f64>(), 0.25, comp = abs, tol = 1e-14);
        assert!(x.iter().all(|x| (x.z - 1.0).abs() < 1e-14));
    }
    let area: f64 = scales.iter().flatten().sum();
    assert_scalar_eq!(area, 2.0, comp = abs, tol = 1e-13);
}

proptest! {
    #[test]
    fn residual_is_linear_for_laplace(
        a in prop::collection::vec(-1.0..1.0, 27),
        b in prop::collection::vec(-1.0..1.0, 27),
        alpha in -2.0..2.0,
    ) {
        let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
        let thetas = problem.full_material();
        let a = DVector::from_vec(a);
        let b = DVector::from_vec(b);
        let lhs = problem.compute_residual(&(&a * alpha + &b), &thetas);
        let rhs = problem.compute_residual(&a, &thetas) * alpha + problem.compute_residual(&b, &thetas);
        assert_matrix_eq!(lhs, rhs, comp = abs, tol = 1e-12);
    }

    #[test]
    fn traction_is_linear_in_design(theta in 0.01..1.0) {
        let problem = laplace_problem(distorted_unit_cube_mesh(), BoundaryConditions::new());
        let u = DVector::from_iterator(problem.num_dofs(), problem.mesh().vertices().iter().map(|x| x.y));
        let thetas = QuadratureField::uniform(problem.num_cells(), problem.num_quads(), theta);
        let flux: SVector<f64, 1> = problem.compute_traction(|x| (x.y - 1.0).abs() < 1e-12, &u, &thetas);
        assert_scalar_eq!(flux[0], theta, comp = abs, tol = 1e-12);
    }
}

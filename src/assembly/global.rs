use crate::assembly::local::{
    assemble_element_elliptic_matrix, assemble_element_elliptic_vector, element_design_sensitivity,
    element_elliptic_jvp, gather_global_to_local,
};
use crate::assembly::operators::EllipticOperator;
use crate::boundary::BodyForce;
use crate::connectivity::Hex8Connectivity;
use crate::design::QuadratureField;
use crate::mesh::BoundaryFace;
use crate::nalgebra::{DMatrix, DVector, Point3, SMatrix, SVector};
use crate::nalgebra_sparse::{CooMatrix, CsrMatrix};
use crate::space::FiniteElementSpace;
use crate::Real;
use rayon::prelude::*;

/// Adds the element vector (`VEC x 8`) to the global node-major vector.
pub fn add_local_to_global<T: Real, const VEC: usize>(
    global: &mut DVector<T>,
    local: &SMatrix<T, VEC, 8>,
    connectivity: &Hex8Connectivity,
) {
    for (node, &vertex) in connectivity.0.iter().enumerate() {
        for i in 0..VEC {
            global[vertex * VEC + i] += local[(i, node)];
        }
    }
}

/// Sums per-cell vectors in cell order.
///
/// The element computations run in parallel but are accumulated sequentially, so the result is
/// independent of the number of threads.
fn scatter_element_vectors<T: Real, const VEC: usize>(
    space: &FiniteElementSpace,
    element_vectors: &[SMatrix<T, VEC, 8>],
) -> DVector<T> {
    let mesh = space.mesh();
    let mut global = DVector::zeros(mesh.num_vertices() * VEC);
    for (local, connectivity) in element_vectors.iter().zip(mesh.connectivity()) {
        add_local_to_global(&mut global, local, connectivity);
    }
    global
}

fn check_dimensions<T: Real, const VEC: usize>(space: &FiniteElementSpace, u: &[T], thetas: &QuadratureField<T>) {
    assert_eq!(u.len(), space.num_vertices() * VEC, "Solution vector has wrong length");
    assert_eq!(thetas.num_quads(), space.num_quads(), "Quadrature field has wrong number of points per cell");
    assert_eq!(thetas.num_cells(), space.num_cells(), "Quadrature field has wrong number of cells");
}

/// Global weak-form vector `Σ_cells r_e(u)`, without external loads.
pub fn assemble_elliptic_vector<T, Op, const VEC: usize>(
    space: &FiniteElementSpace,
    operator: &Op,
    u: &[T],
    thetas: &QuadratureField<T>,
) -> DVector<T>
where
    T: Real,
    Op: EllipticOperator<VEC>,
{
    check_dimensions::<T, VEC>(space, u, thetas);
    let connectivity = space.mesh().connectivity();
    let element_vectors: Vec<_> = (0..space.num_cells())
        .into_par_iter()
        .map(|cell| {
            let u_element = gather_global_to_local::<T, VEC>(u, &connectivity[cell]);
            assemble_element_elliptic_vector(
                operator,
                &u_element,
                thetas.cell(cell),
                space.shape_gradients(cell),
                space.jxw(cell),
            )
        })
        .collect();
    scatter_element_vectors(space, &element_vectors)
}

/// Global tangent matrix, assembled from the automatically differentiated element residuals.
pub fn assemble_elliptic_matrix<Op, const VEC: usize>(
    space: &FiniteElementSpace,
    operator: &Op,
    u: &DVector<f64>,
    thetas: &QuadratureField<f64>,
) -> CsrMatrix<f64>
where
    Op: EllipticOperator<VEC>,
{
    check_dimensions::<f64, VEC>(space, u.as_slice(), thetas);
    let connectivity = space.mesh().connectivity();
    let element_matrices: Vec<DMatrix<f64>> = (0..space.num_cells())
        .into_par_iter()
        .map(|cell| {
            let u_element = gather_global_to_local::<f64, VEC>(u.as_slice(), &connectivity[cell]);
            assemble_element_elliptic_matrix(
                operator,
                &u_element,
                thetas.cell(cell),
                space.shape_gradients(cell),
                space.jxw(cell),
            )
        })
        .collect();

    let n = space.num_vertices() * VEC;
    let mut coo = CooMatrix::new(n, n);
    let global_dof = |conn: &Hex8Connectivity, local: usize| conn.0[local / VEC] * VEC + local % VEC;
    for (matrix, conn) in element_matrices.iter().zip(connectivity) {
        for (local_col, column) in matrix.column_iter().enumerate() {
            let col = global_dof(conn, local_col);
            for (local_row, &value) in column.iter().enumerate() {
                coo.push(global_dof(conn, local_row), col, value);
            }
        }
    }
    // Duplicate entries are summed by the conversion
    CsrMatrix::from(&coo)
}

/// Matrix-free Jacobian-vector product `J(u) v`.
pub fn assemble_elliptic_jvp<Op, const VEC: usize>(
    space: &FiniteElementSpace,
    operator: &Op,
    u: &DVector<f64>,
    thetas: &QuadratureField<f64>,
    v: &DVector<f64>,
) -> DVector<f64>
where
    Op: EllipticOperator<VEC>,
{
    check_dimensions::<f64, VEC>(space, u.as_slice(), thetas);
    assert_eq!(v.len(), u.len(), "Direction has wrong length");
    let connectivity = space.mesh().connectivity();
    let element_vectors: Vec<_> = (0..space.num_cells())
        .into_par_iter()
        .map(|cell| {
            let conn = &connectivity[cell];
            element_elliptic_jvp(
                operator,
                &gather_global_to_local::<f64, VEC>(u.as_slice(), conn),
                &gather_global_to_local::<f64, VEC>(v.as_slice(), conn),
                thetas.cell(cell),
                space.shape_gradients(cell),
                space.jxw(cell),
            )
        })
        .collect();
    scatter_element_vectors(space, &element_vectors)
}

/// Diagonal of the tangent matrix.
pub fn assemble_elliptic_diagonal<Op, const VEC: usize>(
    space: &FiniteElementSpace,
    operator: &Op,
    u: &DVector<f64>,
    thetas: &QuadratureField<f64>,
) -> DVector<f64>
where
    Op: EllipticOperator<VEC>,
{
    check_dimensions::<f64, VEC>(space, u.as_slice(), thetas);
    let connectivity = space.mesh().connectivity();
    let element_diagonals: Vec<SMatrix<f64, VEC, 8>> = (0..space.num_cells())
        .into_par_iter()
        .map(|cell| {
            let matrix = assemble_element_elliptic_matrix(
                operator,
                &gather_global_to_local::<f64, VEC>(u.as_slice(), &connectivity[cell]),
                thetas.cell(cell),
                space.shape_gradients(cell),
                space.jxw(cell),
            );
            SMatrix::from_fn(|i, node| matrix[(node * VEC + i, node * VEC + i)])
        })
        .collect();
    scatter_element_vectors(space, &element_diagonals)
}

/// `λᵀ ∂R/∂p_k` for each cell `k` in `cells`, where `p_k` is a design value shared by all
/// quadrature points of the cell.
pub fn assemble_design_vjp<Op, const VEC: usize>(
    space: &FiniteElementSpace,
    operator: &Op,
    u: &DVector<f64>,
    thetas: &QuadratureField<f64>,
    cells: &[usize],
    adjoint: &DVector<f64>,
) -> DVector<f64>
where
    Op: EllipticOperator<VEC>,
{
    check_dimensions::<f64, VEC>(space, u.as_slice(), thetas);
    assert_eq!(adjoint.len(), u.len(), "Adjoint vector has wrong length");
    let connectivity = space.mesh().connectivity();
    let vjp: Vec<f64> = cells
        .par_iter()
        .map(|&cell| {
            let conn = &connectivity[cell];
            let sensitivity = element_design_sensitivity(
                operator,
                &gather_global_to_local::<f64, VEC>(u.as_slice(), conn),
                thetas.cell(cell),
                space.shape_gradients(cell),
                space.jxw(cell),
            );
            sensitivity.dot(&gather_global_to_local::<f64, VEC>(adjoint.as_slice(), conn))
        })
        .collect();
    DVector::from_vec(vjp)
}

/// Load vector `Σ_faces ∫ t · N_I dA` of a traction on the given faces.
pub fn assemble_neumann_load<const VEC: usize>(
    space: &FiniteElementSpace,
    faces: &[BoundaryFace],
    traction: impl Fn(&Point3<f64>) -> SVector<f64, VEC> + Sync,
) -> DVector<f64> {
    let connectivity = space.mesh().connectivity();
    let face_vectors: Vec<SMatrix<f64, VEC, 8>> = faces
        .par_iter()
        .map(|face| {
            let data = space.face_quadrature_data(face);
            let basis = space.face_shape_values(face.face);
            let mut local = SMatrix::zeros();
            for ((x, &scale), phi) in data.points.iter().zip(&data.nanson_scale).zip(basis) {
                local += traction(x) * phi.transpose() * scale;
            }
            local
        })
        .collect();

    let mut global = DVector::zeros(space.num_vertices() * VEC);
    for (local, face) in face_vectors.iter().zip(faces) {
        add_local_to_global(&mut global, local, &connectivity[face.cell]);
    }
    global
}

/// Load vector `∫ f · N_I dx` of a body force.
pub fn assemble_body_force_load<const VEC: usize>(space: &FiniteElementSpace, force: &BodyForce<VEC>) -> DVector<f64> {
    let element_vectors: Vec<SMatrix<f64, VEC, 8>> = (0..space.num_cells())
        .into_par_iter()
        .map(|cell| {
            let mut local = SMatrix::zeros();
            for ((x, &w), phi) in space
                .quadrature_points(cell)
                .iter()
                .zip(space.jxw(cell))
                .zip(space.shape_values())
            {
                local += force.evaluate(x) * phi.transpose() * w;
            }
            local
        })
        .collect();
    scatter_element_vectors(space, &element_vectors)
}

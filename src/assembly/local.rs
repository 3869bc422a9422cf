use crate::assembly::operators::EllipticOperator;
use crate::connectivity::Hex8Connectivity;
use crate::nalgebra::{DMatrix, SMatrix, SVector};
use crate::{Dual, Real};
use itertools::izip;

/// Gathers the nodal values of an element into a `VEC x 8` matrix (one column per node).
pub fn gather_global_to_local<T: Real, const VEC: usize>(u: &[T], connectivity: &Hex8Connectivity) -> SMatrix<T, VEC, 8> {
    SMatrix::from_fn(|i, node| u[connectivity.0[node] * VEC + i])
}

/// `∇u = U Gᵀ` for nodal values `U` (`VEC x 8`) and physical gradients `G` (`3 x 8`).
pub fn compute_volume_u_grad<T: Real, const VEC: usize>(
    u_element: &SMatrix<T, VEC, 8>,
    gradients: &SMatrix<T, 3, 8>,
) -> SMatrix<T, VEC, 3> {
    u_element * gradients.transpose()
}

/// Interpolates nodal values with the given basis values.
pub fn interpolate_element<T: Real, const VEC: usize>(u_element: &SMatrix<T, VEC, 8>, basis: &SVector<f64, 8>) -> SVector<T, VEC> {
    u_element * basis.map(T::from_f64)
}

/// Element residual `r_{iI} = Σ_q σ(∇u_q, θ_q)_{ij} ∂N_I/∂x_j JxW_q`, as a `VEC x 8` matrix.
pub fn assemble_element_elliptic_vector<T, Op, const VEC: usize>(
    operator: &Op,
    u_element: &SMatrix<T, VEC, 8>,
    thetas: &[T],
    shape_gradients: &[SMatrix<f64, 3, 8>],
    jxw: &[f64],
) -> SMatrix<T, VEC, 8>
where
    T: Real,
    Op: EllipticOperator<VEC>,
{
    assert_eq!(thetas.len(), jxw.len());
    assert_eq!(shape_gradients.len(), jxw.len());

    let mut output = SMatrix::<T, VEC, 8>::zeros();
    for (g, &theta, &w) in izip!(shape_gradients, thetas, jxw) {
        let g = g.map(T::from_f64);
        let u_grad = compute_volume_u_grad(u_element, &g);
        let flux = operator.compute_elliptic_term(&u_grad, theta);
        output += flux * g * T::from_f64(w);
    }
    output
}

/// Element tangent matrix `∂r/∂u` of size `8 VEC x 8 VEC`, with local DOFs numbered
/// node-major (`node * VEC + component`).
///
/// Each column is the tangent part of one evaluation of the element residual on dual numbers,
/// seeded in the corresponding local DOF.
pub fn assemble_element_elliptic_matrix<Op, const VEC: usize>(
    operator: &Op,
    u_element: &SMatrix<f64, VEC, 8>,
    thetas: &[f64],
    shape_gradients: &[SMatrix<f64, 3, 8>],
    jxw: &[f64],
) -> DMatrix<f64>
where
    Op: EllipticOperator<VEC>,
{
    let n = 8 * VEC;
    let thetas: Vec<_> = thetas.iter().map(|&theta| Dual::constant(theta)).collect();
    let mut matrix = DMatrix::zeros(n, n);
    for node in 0..8 {
        for i in 0..VEC {
            let mut u_dual = u_element.map(Dual::constant);
            u_dual[(i, node)].eps = 1.0;
            let r = assemble_element_elliptic_vector(operator, &u_dual, &thetas, shape_gradients, jxw);
            let col = node * VEC + i;
            // Column-major iteration over r (VEC x 8) visits node-major local DOFs
            for (row, r_entry) in r.iter().enumerate() {
                matrix[(row, col)] = r_entry.eps;
            }
        }
    }
    matrix
}

/// Directional derivative `(∂r/∂u) v` of the element residual in direction `v_element`.
pub fn element_elliptic_jvp<Op, const VEC: usize>(
    operator: &Op,
    u_element: &SMatrix<f64, VEC, 8>,
    v_element: &SMatrix<f64, VEC, 8>,
    thetas: &[f64],
    shape_gradients: &[SMatrix<f64, 3, 8>],
    jxw: &[f64],
) -> SMatrix<f64, VEC, 8>
where
    Op: EllipticOperator<VEC>,
{
    let u_dual = u_element.zip_map(v_element, Dual::new);
    let thetas: Vec<_> = thetas.iter().map(|&theta| Dual::constant(theta)).collect();
    assemble_element_elliptic_vector(operator, &u_dual, &thetas, shape_gradients, jxw).map(|r| r.eps)
}

/// Derivative of the element residual with respect to a design value shared by every
/// quadrature point of the element.
pub fn element_design_sensitivity<Op, const VEC: usize>(
    operator: &Op,
    u_element: &SMatrix<f64, VEC, 8>,
    thetas: &[f64],
    shape_gradients: &[SMatrix<f64, 3, 8>],
    jxw: &[f64],
) -> SMatrix<f64, VEC, 8>
where
    Op: EllipticOperator<VEC>,
{
    let u_dual = u_element.map(Dual::constant);
    let thetas: Vec<_> = thetas.iter().map(|&theta| Dual::variable(theta)).collect();
    assemble_element_elliptic_vector(operator, &u_dual, &thetas, shape_gradients, jxw).map(|r| r.eps)
}

use crate::nalgebra::SMatrix;
use crate::Real;
use serde::{Deserialize, Serialize};

/// The constitutive "tensor map" of a second-order elliptic operator in three dimensions.
///
/// Given the gradient `∇u` of a field with `VEC` components, laid out as a `VEC x 3` matrix
/// with `gradient[(i, j)] = ∂u_i/∂x_j`, and the local design value `theta`, returns the flux
/// (for elasticity: the stress) in the same layout. The weak form is
///
/// $$ \int_\Omega \sigma(\nabla u, \theta) : \nabla v \, dx. $$
///
/// The map is generic over the scalar type so that it can be differentiated by evaluating it
/// on dual numbers. Implementations must only use the operations of [`Real`].
pub trait EllipticOperator<const VEC: usize>: Sync {
    fn compute_elliptic_term<T: Real>(&self, gradient: &SMatrix<T, VEC, 3>, theta: T) -> SMatrix<T, VEC, 3>;
}

/// The scalar diffusion operator with flux `theta ∇u`, i.e. the weak form of
/// $-\nabla \cdot (\theta \nabla u)$.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaplaceOperator;

impl EllipticOperator<1> for LaplaceOperator {
    fn compute_elliptic_term<T: Real>(&self, gradient: &SMatrix<T, 1, 3>, theta: T) -> SMatrix<T, 1, 3> {
        gradient * theta
    }
}

//! Solid mechanics functionality for `topofem`.
use crate::materials::LameParameters;
use topofem::nalgebra::Matrix3;
use topofem::{Dual, Real};

pub mod elasticity;
pub mod interpolation;
pub mod materials;

pub use elasticity::{Elasticity, ElasticityModel, ElasticityProblem};
pub use interpolation::{MaterialInterpolation, SimpParameters};

/// First Piola-Kirchhoff stress `P = ∂ψ/∂F`, obtained by forward-mode differentiation of the
/// energy density of `material`.
pub fn stress_from_energy_density<T, M>(material: &M, deformation_gradient: &Matrix3<T>, parameters: &LameParameters<T>) -> Matrix3<T>
where
    T: Real,
    M: HyperelasticMaterial + ?Sized,
{
    let parameters = LameParameters {
        mu: Dual::constant(parameters.mu),
        lambda: Dual::constant(parameters.lambda),
    };
    topofem_traits::dual::gradient(
        |f| material.compute_energy_density(f, &parameters),
        deformation_gradient,
    )
}

pub trait HyperelasticMaterial {
    /// Compute the energy density $\psi = \psi(\vec F)$ associated with the material.
    fn compute_energy_density<T: Real>(&self, deformation_gradient: &Matrix3<T>, parameters: &LameParameters<T>) -> T;

    /// Compute the First Piola-Kirchhoff stress tensor $\vec P = \vec P(\vec F)$.
    ///
    /// By default the stress is the derivative of the energy density, see
    /// [`stress_from_energy_density`]. Materials may override this with a closed form.
    fn compute_stress_tensor<T: Real>(&self, deformation_gradient: &Matrix3<T>, parameters: &LameParameters<T>) -> Matrix3<T> {
        stress_from_energy_density(self, deformation_gradient, parameters)
    }
}

use crate::HyperelasticMaterial;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use topofem::nalgebra::Matrix3;
use topofem::Real;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LameParameters<T> {
    pub mu: T,
    pub lambda: T,
}

impl<T: Real> LameParameters<T> {
    /// The bulk modulus $\kappa = \lambda + \frac{2}{3} \mu$.
    #[replace_float_literals(T::from_f64(literal))]
    pub fn bulk_modulus(&self) -> T {
        self.lambda + 2.0 * self.mu / 3.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YoungPoisson<T> {
    pub young: T,
    pub poisson: T,
}

impl<T> From<YoungPoisson<T>> for LameParameters<T>
where
    T: Real,
{
    #[replace_float_literals(T::from_f64(literal))]
    fn from(params: YoungPoisson<T>) -> Self {
        let YoungPoisson { young, poisson } = params;
        let mu = 0.5 * young / (1.0 + poisson);
        let lambda = 2.0 * mu * poisson / (1.0 - 2.0 * poisson);
        Self { mu, lambda }
    }
}

/// Determinant of a 3x3 matrix by cofactor expansion along the first row.
pub fn det3<T: Real>(m: &Matrix3<T>) -> T {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)]) - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

/// The linear elastic material model.
///
/// Given Lamé parameters $\mu$ and $\lambda$, the strain energy density is
/// $$
/// \psi(\vec F) =
///     \mu \vec \epsilon : \vec \epsilon
///   + \frac{\lambda}{2} \operatorname{tr}^2(\vec \epsilon),
/// $$
/// where
/// $$
/// \vec \epsilon(\vec F) = \frac{(\vec F + \vec F^T)}{2} - \vec I
/// $$
/// is the infinitesimal strain tensor. The associated stress tensor is
/// $$
/// \vec P(\vec F) = 2 \mu \vec \epsilon + \lambda \operatorname{tr}(\vec \epsilon) \vec I.
/// $$
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearElasticMaterial;

#[allow(non_snake_case)]
#[replace_float_literals(T::from_f64(literal))]
fn infinitesimal_strain_tensor<T: Real>(deformation_gradient: &Matrix3<T>) -> Matrix3<T> {
    let F = deformation_gradient;
    (F + F.transpose()) * 0.5 - Matrix3::identity()
}

#[replace_float_literals(T::from_f64(literal))]
impl HyperelasticMaterial for LinearElasticMaterial {
    fn compute_energy_density<T: Real>(&self, deformation_gradient: &Matrix3<T>, parameters: &LameParameters<T>) -> T {
        let &LameParameters { mu, lambda } = parameters;
        let eps = infinitesimal_strain_tensor(deformation_gradient);
        let tr = eps.trace();
        mu * eps.dot(&eps) + 0.5 * lambda * tr * tr
    }

    fn compute_stress_tensor<T: Real>(&self, deformation_gradient: &Matrix3<T>, parameters: &LameParameters<T>) -> Matrix3<T> {
        let &LameParameters { mu, lambda } = parameters;
        let eps = infinitesimal_strain_tensor(deformation_gradient);
        let eps_tr = eps.trace();
        eps * (2.0 * mu) + Matrix3::identity() * (lambda * eps_tr)
    }
}

/// A compressible Neo-Hookean material model with a volumetric-isochoric split.
///
/// The strain energy density is given by
/// $$
/// \psi(\vec F) = \frac{\mu}{2}\left(J^{-2/3} I_C - 3\right) + \frac{\kappa}{2}(J - 1)^2,
/// $$
/// where $J = \det \vec F$, $I_C = \tr{\vec F^T \vec F}$ is the first right Cauchy-Green
/// invariant and $\kappa$ is the bulk modulus.
///
/// The stress is not implemented in closed form: it is the derivative of $\psi$ computed by
/// [`stress_from_energy_density`](crate::stress_from_energy_density). Inverted deformations
/// ($J \leq 0$) produce NaN.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeoHookeanMaterial;

const ISOCHORIC_EXPONENT: f64 = -2.0 / 3.0;

#[allow(non_snake_case)]
#[replace_float_literals(T::from_f64(literal))]
impl HyperelasticMaterial for NeoHookeanMaterial {
    fn compute_energy_density<T: Real>(&self, deformation_gradient: &Matrix3<T>, parameters: &LameParameters<T>) -> T {
        let F = deformation_gradient;
        let mu = parameters.mu;
        let kappa = parameters.bulk_modulus();
        let J = det3(F);
        let I_C = (F.transpose() * F).trace();
        let J_minus_one = J - 1.0;
        0.5 * mu * (J.powf(ISOCHORIC_EXPONENT) * I_C - 3.0) + 0.5 * kappa * J_minus_one * J_minus_one
    }
}

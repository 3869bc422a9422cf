//! Interpolation of material parameters from the design field.
use crate::materials::{LameParameters, YoungPoisson};
use serde::{Deserialize, Serialize};
use topofem::Real;

/// Solid Isotropic Material with Penalization.
///
/// The Young's modulus is
/// $$
/// E(\theta) = E_{min} + (E_{max} - E_{min}) (\theta + \text{offset})^p,
/// $$
/// where the offset keeps the stiffness away from zero for void cells (`theta = 0`).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpParameters {
    pub young_min: f64,
    pub young_max: f64,
    pub poisson: f64,
    pub penalty: f64,
    pub offset: f64,
}

impl SimpParameters {
    /// Parameters for linear elasticity, `E ∈ [70, 70e3]`.
    pub fn linear_elasticity() -> Self {
        Self {
            young_min: 70.0,
            young_max: 70e3,
            poisson: 0.3,
            penalty: 3.0,
            offset: 0.01,
        }
    }

    /// Parameters for hyperelasticity, `E ∈ [1, 1e3]`.
    pub fn hyperelasticity() -> Self {
        Self {
            young_min: 1.0,
            young_max: 1e3,
            ..Self::linear_elasticity()
        }
    }

    pub fn young_modulus<T: Real>(&self, theta: T) -> T {
        let scale = T::from_f64(self.young_max - self.young_min);
        T::from_f64(self.young_min) + scale * (theta + T::from_f64(self.offset)).powf(self.penalty)
    }

    /// Material parameters of a cell with `theta = 1`.
    pub fn full_material(&self) -> YoungPoisson<f64> {
        YoungPoisson {
            young: self.young_modulus(1.0),
            poisson: self.poisson,
        }
    }
}

impl Default for SimpParameters {
    fn default() -> Self {
        Self::linear_elasticity()
    }
}

/// How Lamé parameters are obtained from the design value `theta`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialInterpolation {
    Simp(SimpParameters),
    /// Homogeneous material that ignores `theta`.
    Constant(YoungPoisson<f64>),
}

impl MaterialInterpolation {
    pub fn lame_parameters<T: Real>(&self, theta: T) -> LameParameters<T> {
        match self {
            Self::Simp(simp) => LameParameters::from(YoungPoisson {
                young: simp.young_modulus(theta),
                poisson: T::from_f64(simp.poisson),
            }),
            Self::Constant(YoungPoisson { young, poisson }) => LameParameters::from(YoungPoisson {
                young: T::from_f64(*young),
                poisson: T::from_f64(*poisson),
            }),
        }
    }
}

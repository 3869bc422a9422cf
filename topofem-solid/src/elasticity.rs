//! Elasticity as an elliptic operator, and the problem wrapper built on it.
use crate::interpolation::{MaterialInterpolation, SimpParameters};
use crate::materials::{LinearElasticMaterial, NeoHookeanMaterial};
use crate::HyperelasticMaterial;
use log::info;
use serde::{Deserialize, Serialize};
use topofem::assembly::operators::EllipticOperator;
use topofem::boundary::BoundaryConditions;
use topofem::design::DesignField;
use topofem::error::FemError;
use topofem::mesh::HexMesh;
use topofem::nalgebra::{DVector, Matrix3, Point3, SMatrix, Vector3};
use topofem::nalgebra_sparse::CsrMatrix;
use topofem::problem::EllipticProblem;
use topofem::solver::{solve, SolveError, SolveOutput, SolverSettings};
use topofem::Real;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElasticityModel {
    /// Small-strain linear elasticity.
    Linear,
    /// Compressible Neo-Hookean hyperelasticity.
    NeoHookean,
}

/// The stress map `σ(∇u, θ) = P(I + ∇u)` of an elastic material whose Lamé parameters depend
/// on the design value.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elasticity {
    pub model: ElasticityModel,
    pub interpolation: MaterialInterpolation,
}

impl Elasticity {
    /// Linear elasticity with [`SimpParameters::linear_elasticity`].
    pub fn linear() -> Self {
        Self {
            model: ElasticityModel::Linear,
            interpolation: MaterialInterpolation::Simp(SimpParameters::linear_elasticity()),
        }
    }

    /// Neo-Hookean hyperelasticity with [`SimpParameters::hyperelasticity`].
    pub fn neo_hookean() -> Self {
        Self {
            model: ElasticityModel::NeoHookean,
            interpolation: MaterialInterpolation::Simp(SimpParameters::hyperelasticity()),
        }
    }
}

impl EllipticOperator<3> for Elasticity {
    #[allow(non_snake_case)]
    fn compute_elliptic_term<T: Real>(&self, gradient: &SMatrix<T, 3, 3>, theta: T) -> SMatrix<T, 3, 3> {
        let F = gradient + Matrix3::identity();
        let parameters = self.interpolation.lame_parameters(theta);
        match self.model {
            ElasticityModel::Linear => LinearElasticMaterial.compute_stress_tensor(&F, &parameters),
            ElasticityModel::NeoHookean => NeoHookeanMaterial.compute_stress_tensor(&F, &parameters),
        }
    }
}

/// A named elasticity problem whose operations take a [`DesignField`] rather than quadrature
/// values.
///
/// Every call broadcasts the design to the quadrature points anew, so the same problem can be
/// evaluated for any number of designs.
#[derive(Debug)]
pub struct ElasticityProblem {
    name: String,
    problem: EllipticProblem<Elasticity, 3>,
}

impl ElasticityProblem {
    pub fn new(
        name: impl Into<String>,
        mesh: HexMesh,
        elasticity: Elasticity,
        conditions: BoundaryConditions<3>,
    ) -> Result<Self, FemError> {
        let name = name.into();
        let problem = EllipticProblem::new(mesh, elasticity, conditions)?;
        info!("Created elasticity problem \"{}\" ({:?})", name, elasticity.model);
        Ok(Self { name, problem })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying elliptic problem, for operations on raw quadrature values.
    pub fn problem(&self) -> &EllipticProblem<Elasticity, 3> {
        &self.problem
    }

    pub fn num_cells(&self) -> usize {
        self.problem.num_cells()
    }

    pub fn num_quads(&self) -> usize {
        self.problem.num_quads()
    }

    pub fn num_dofs(&self) -> usize {
        self.problem.num_dofs()
    }

    pub fn cell_centroids(&self) -> Vec<Point3<f64>> {
        self.problem.cell_centroids()
    }

    /// Every cell flexible, with parameter `1.0`.
    pub fn default_design(&self) -> DesignField {
        DesignField::uniform(self.num_cells(), 1.0)
    }

    pub fn compute_residual(&self, sol: &DVector<f64>, design: &DesignField) -> Result<DVector<f64>, FemError> {
        let thetas = self.problem.set_params(design)?;
        self.check_solution(sol)?;
        Ok(self.problem.compute_residual(sol, &thetas))
    }

    pub fn newton_update(&self, sol: &DVector<f64>, design: &DesignField) -> Result<CsrMatrix<f64>, FemError> {
        let thetas = self.problem.set_params(design)?;
        self.check_solution(sol)?;
        Ok(self.problem.newton_update(sol, &thetas))
    }

    /// See [`EllipticProblem::residual_design_vjp`].
    pub fn residual_design_vjp(
        &self,
        sol: &DVector<f64>,
        design: &DesignField,
        adjoint: &DVector<f64>,
    ) -> Result<DVector<f64>, FemError> {
        self.check_solution(sol)?;
        self.problem.residual_design_vjp(sol, design, adjoint)
    }

    pub fn compute_compliance(
        &self,
        traction: impl Fn(&Point3<f64>) -> Vector3<f64>,
        sol: &DVector<f64>,
    ) -> Result<f64, FemError> {
        self.check_solution(sol)?;
        Ok(self.problem.compute_compliance(traction, sol))
    }

    /// Total force `∫ P n dA` over the boundary faces selected by `location`.
    pub fn compute_traction(
        &self,
        location: impl Fn(&Point3<f64>) -> bool,
        sol: &DVector<f64>,
        design: &DesignField,
    ) -> Result<Vector3<f64>, FemError> {
        let thetas = self.problem.set_params(design)?;
        self.check_solution(sol)?;
        Ok(self.problem.compute_traction(location, sol, &thetas))
    }

    /// Solves `R(u, θ(design)) = 0` for `u`.
    pub fn solve(
        &self,
        design: &DesignField,
        initial_guess: Option<&DVector<f64>>,
        settings: &SolverSettings,
    ) -> Result<SolveOutput, SolveError> {
        let thetas = self.problem.set_params(design)?;
        info!("Solving elasticity problem \"{}\"", self.name);
        solve(&self.problem.with_thetas(thetas), initial_guess, settings)
    }

    fn check_solution(&self, sol: &DVector<f64>) -> Result<(), FemError> {
        if sol.len() == self.num_dofs() {
            Ok(())
        } else {
            Err(FemError::DimensionMismatch {
                what: "solution vector",
                expected: self.num_dofs(),
                actual: sol.len(),
            })
        }
    }
}

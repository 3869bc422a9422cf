//! Discrete elliptic boundary-value problems on Hex8 meshes.
use crate::assembly::global::{
    assemble_body_force_load, assemble_design_vjp, assemble_elliptic_diagonal, assemble_elliptic_jvp,
    assemble_elliptic_matrix, assemble_elliptic_vector, assemble_neumann_load,
};
use crate::assembly::local::{compute_volume_u_grad, gather_global_to_local, interpolate_element};
use crate::assembly::operators::EllipticOperator;
use crate::boundary::{BoundaryConditions, DirichletBoundaryConditions};
use crate::design::{DesignField, QuadratureField};
use crate::error::FemError;
use crate::mesh::{BoundaryFace, HexMesh};
use crate::nalgebra::{DVector, Point3, SMatrix, SVector};
use crate::nalgebra_sparse::CsrMatrix;
use crate::quadrature::DEFAULT_POINTS_PER_DIM;
use crate::solver::DesignedProblem;
use crate::space::FiniteElementSpace;
use crate::Real;
use log::info;

/// A nonlinear elliptic problem `R(u, θ) = 0` with `VEC` solution components per node.
///
/// The residual is
///
/// $$ R_{Ii}(u, \theta) = \sum_{cells} \sum_q \sigma(\nabla u_q, \theta_q)_{ij} \frac{\partial N_I}{\partial x_j} w_q \det J_q - F^{ext}_{Ii}, $$
///
/// where `σ` is the tensor map of the operator and `F^ext` collects the Neumann tractions and
/// the body force. The mesh, the shape-function cache, the resolved boundary conditions and the
/// external load are computed once at construction; everything that depends on the solution or
/// on the design is evaluated per call.
#[derive(Debug)]
pub struct EllipticProblem<Op, const VEC: usize> {
    space: FiniteElementSpace,
    operator: Op,
    dirichlet: DirichletBoundaryConditions,
    neumann_faces: Vec<Vec<BoundaryFace>>,
    external_load: DVector<f64>,
}

impl<Op, const VEC: usize> EllipticProblem<Op, VEC>
where
    Op: EllipticOperator<VEC>,
{
    pub fn new(mesh: HexMesh, operator: Op, conditions: BoundaryConditions<VEC>) -> Result<Self, FemError> {
        Self::with_quadrature_points(mesh, operator, conditions, DEFAULT_POINTS_PER_DIM)
    }

    /// Same as [`new`](Self::new), with `points_per_dim` Gauss points per reference direction.
    pub fn with_quadrature_points(
        mesh: HexMesh,
        operator: Op,
        conditions: BoundaryConditions<VEC>,
        points_per_dim: usize,
    ) -> Result<Self, FemError> {
        let dirichlet = DirichletBoundaryConditions::resolve(&mesh, VEC, &conditions.dirichlet)?;
        let space = FiniteElementSpace::new(mesh, points_per_dim)?;

        let mut external_load = DVector::zeros(space.num_vertices() * VEC);
        let mut neumann_faces = Vec::with_capacity(conditions.neumann.len());
        for bc in &conditions.neumann {
            let faces = space.mesh().select_boundary_faces(|x| bc.location(x));
            external_load += assemble_neumann_load(&space, &faces, |x| bc.traction(x));
            neumann_faces.push(faces);
        }
        if let Some(force) = &conditions.body_force {
            external_load += assemble_body_force_load(&space, force);
        }

        info!(
            "Constructed problem: {} cells, {} vertices, {} DOFs ({} constrained), {} Neumann faces",
            space.num_cells(),
            space.num_vertices(),
            dirichlet.num_dofs(),
            dirichlet.constrained().len(),
            neumann_faces.iter().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            space,
            operator,
            dirichlet,
            neumann_faces,
            external_load,
        })
    }

    pub fn space(&self) -> &FiniteElementSpace {
        &self.space
    }

    pub fn mesh(&self) -> &HexMesh {
        self.space.mesh()
    }

    pub fn operator(&self) -> &Op {
        &self.operator
    }

    pub fn dirichlet(&self) -> &DirichletBoundaryConditions {
        &self.dirichlet
    }

    /// The faces of each Neumann condition, in the order the conditions were given.
    pub fn neumann_faces(&self) -> &[Vec<BoundaryFace>] {
        &self.neumann_faces
    }

    /// Precomputed Neumann and body-force load vector.
    pub fn external_load(&self) -> &DVector<f64> {
        &self.external_load
    }

    pub fn num_cells(&self) -> usize {
        self.space.num_cells()
    }

    pub fn num_quads(&self) -> usize {
        self.space.num_quads()
    }

    pub fn num_face_quads(&self) -> usize {
        self.space.num_face_quads()
    }

    pub fn num_dofs(&self) -> usize {
        self.space.num_vertices() * VEC
    }

    /// Number of solution components per node (`vec`).
    pub fn solution_dim(&self) -> usize {
        VEC
    }

    /// Spatial dimension (`dim`).
    pub fn geometry_dim(&self) -> usize {
        3
    }

    pub fn cell_centroids(&self) -> Vec<Point3<f64>> {
        self.mesh().cell_centroids()
    }

    /// Boundary faces whose vertices all satisfy `location`.
    pub fn boundary_faces(&self, location: impl Fn(&Point3<f64>) -> bool) -> Vec<BoundaryFace> {
        self.mesh().select_boundary_faces(location)
    }

    /// Broadcasts a design to the quadrature points of this problem's mesh.
    pub fn set_params(&self, design: &DesignField) -> Result<QuadratureField<f64>, FemError> {
        design.set_params(self.num_cells(), self.num_quads())
    }

    /// Design values of `1.0` everywhere.
    pub fn full_material(&self) -> QuadratureField<f64> {
        QuadratureField::uniform(self.num_cells(), self.num_quads(), 1.0)
    }

    /// The residual `R(u, θ)` on all DOFs, including constrained ones.
    ///
    /// # Panics
    ///
    /// Panics if `sol` or `thetas` do not match the dimensions of the problem.
    pub fn compute_residual(&self, sol: &DVector<f64>, thetas: &QuadratureField<f64>) -> DVector<f64> {
        self.compute_residual_generic(sol.as_slice(), thetas)
    }

    /// [`compute_residual`](Self::compute_residual) on an arbitrary scalar type.
    pub fn compute_residual_generic<T: Real>(&self, sol: &[T], thetas: &QuadratureField<T>) -> DVector<T> {
        let mut residual = assemble_elliptic_vector(&self.space, &self.operator, sol, thetas);
        for (r, &f) in residual.iter_mut().zip(self.external_load.iter()) {
            *r -= T::from_f64(f);
        }
        residual
    }

    /// The Jacobian `∂R/∂u` on all DOFs.
    pub fn newton_update(&self, sol: &DVector<f64>, thetas: &QuadratureField<f64>) -> CsrMatrix<f64> {
        assemble_elliptic_matrix(&self.space, &self.operator, sol, thetas)
    }

    /// `(∂R/∂u) v`, computed without forming the Jacobian.
    pub fn jacobian_vector_product(
        &self,
        sol: &DVector<f64>,
        thetas: &QuadratureField<f64>,
        v: &DVector<f64>,
    ) -> DVector<f64> {
        assemble_elliptic_jvp(&self.space, &self.operator, sol, thetas, v)
    }

    pub fn jacobian_diagonal(&self, sol: &DVector<f64>, thetas: &QuadratureField<f64>) -> DVector<f64> {
        assemble_elliptic_diagonal(&self.space, &self.operator, sol, thetas)
    }

    /// `λᵀ ∂R/∂p`, one entry per flexible cell of `design`.
    ///
    /// This is the design part of the adjoint gradient `dJ/dp = ∂J/∂p - λᵀ ∂R/∂p`, where `λ`
    /// solves `(∂R/∂u)ᵀ λ = (∂J/∂u)ᵀ`.
    pub fn residual_design_vjp(
        &self,
        sol: &DVector<f64>,
        design: &DesignField,
        adjoint: &DVector<f64>,
    ) -> Result<DVector<f64>, FemError> {
        let thetas = self.set_params(design)?;
        if adjoint.len() != self.num_dofs() {
            return Err(FemError::DimensionMismatch {
                what: "adjoint vector",
                expected: self.num_dofs(),
                actual: adjoint.len(),
            });
        }
        Ok(assemble_design_vjp(
            &self.space,
            &self.operator,
            sol,
            &thetas,
            design.flex_inds(),
            adjoint,
        ))
    }

    /// Physical shape-function gradients and surface measures at the quadrature points of each
    /// face.
    pub fn get_face_shape_grads(&self, faces: &[BoundaryFace]) -> (Vec<Vec<SMatrix<f64, 3, 8>>>, Vec<Vec<f64>>) {
        faces
            .iter()
            .map(|face| {
                let data = self.space.face_quadrature_data(face);
                (data.shape_gradients, data.nanson_scale)
            })
            .unzip()
    }

    pub fn physical_surface_quad_points(&self, faces: &[BoundaryFace]) -> Vec<Vec<Point3<f64>>> {
        faces
            .iter()
            .map(|face| self.space.face_quadrature_data(face).points)
            .collect()
    }

    /// The work `Σ ∫ t · u dA` of the traction `t` over all Neumann faces.
    ///
    /// The faces are the union of the faces of every Neumann condition, and a face selected by
    /// more than one condition is integrated once.
    ///
    /// The solution is interpolated to the face quadrature points with the face basis values.
    /// The result is linear in `t` and in `sol`.
    pub fn compute_compliance(
        &self,
        traction: impl Fn(&Point3<f64>) -> SVector<f64, VEC>,
        sol: &DVector<f64>,
    ) -> f64 {
        assert_eq!(sol.len(), self.num_dofs(), "Solution vector has wrong length");
        let connectivity = self.mesh().connectivity();
        let mut faces: Vec<_> = self.neumann_faces.iter().flatten().copied().collect();
        faces.sort_unstable();
        faces.dedup();

        let mut compliance = 0.0;
        for face in &faces {
            let u_element = gather_global_to_local::<f64, VEC>(sol.as_slice(), &connectivity[face.cell]);
            let data = self.space.face_quadrature_data(face);
            let basis = self.space.face_shape_values(face.face);
            for ((x, &scale), phi) in data.points.iter().zip(&data.nanson_scale).zip(basis) {
                let u = interpolate_element(&u_element, phi);
                compliance += traction(x).dot(&u) * scale;
            }
        }
        compliance
    }

    /// The resultant `∫ σ(∇u, θ) n dA` over the boundary faces selected by `location`.
    ///
    /// For elasticity this is the total force transmitted through that part of the boundary.
    /// The design value of a face is the mean of its cell's quadrature values.
    pub fn compute_traction(
        &self,
        location: impl Fn(&Point3<f64>) -> bool,
        sol: &DVector<f64>,
        thetas: &QuadratureField<f64>,
    ) -> SVector<f64, VEC> {
        assert_eq!(sol.len(), self.num_dofs(), "Solution vector has wrong length");
        let connectivity = self.mesh().connectivity();
        let mut traction = SVector::zeros();
        for face in self.boundary_faces(location) {
            let u_element = gather_global_to_local::<f64, VEC>(sol.as_slice(), &connectivity[face.cell]);
            let cell_thetas = thetas.cell(face.cell);
            let theta = cell_thetas.iter().sum::<f64>() / cell_thetas.len() as f64;
            let data = self.space.face_quadrature_data(&face);
            for ((g, n), &scale) in data
                .shape_gradients
                .iter()
                .zip(&data.normals)
                .zip(&data.nanson_scale)
            {
                let u_grad = compute_volume_u_grad(&u_element, g);
                let stress = self.operator.compute_elliptic_term(&u_grad, theta);
                traction += stress * n * scale;
            }
        }
        traction
    }

    /// Binds a design to the problem, yielding a problem in the solution alone.
    pub fn with_thetas(&self, thetas: QuadratureField<f64>) -> DesignedProblem<'_, Op, VEC> {
        DesignedProblem::new(self, thetas)
    }
}

//! Dirichlet and Neumann boundary conditions and the volumetric body force.
use crate::error::FemError;
use crate::mesh::HexMesh;
use crate::nalgebra::{DVector, Point3, SVector};
use crate::nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::collections::BTreeMap;
use std::fmt;

/// Predicate selecting a region of the mesh from a point.
pub type LocationFn = Box<dyn Fn(&Point3<f64>) -> bool + Send + Sync>;

/// Prescribes component `component` of the solution to `value(x)` at every vertex `x` that
/// satisfies `location`.
pub struct DirichletBc {
    location: LocationFn,
    component: usize,
    value: Box<dyn Fn(&Point3<f64>) -> f64 + Send + Sync>,
}

impl DirichletBc {
    pub fn new(
        location: impl Fn(&Point3<f64>) -> bool + Send + Sync + 'static,
        component: usize,
        value: impl Fn(&Point3<f64>) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            location: Box::new(location),
            component,
            value: Box::new(value),
        }
    }

    /// A condition with a constant prescribed value.
    pub fn constant(location: impl Fn(&Point3<f64>) -> bool + Send + Sync + 'static, component: usize, value: f64) -> Self {
        Self::new(location, component, move |_| value)
    }

    pub fn component(&self) -> usize {
        self.component
    }
}

impl fmt::Debug for DirichletBc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirichletBc")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

/// Traction `t(x)` applied on the boundary faces whose vertices all satisfy `location`.
///
/// The traction does not depend on the solution (no follower loads).
pub struct NeumannBc<const VEC: usize> {
    location: LocationFn,
    traction: Box<dyn Fn(&Point3<f64>) -> SVector<f64, VEC> + Send + Sync>,
}

impl<const VEC: usize> NeumannBc<VEC> {
    pub fn new(
        location: impl Fn(&Point3<f64>) -> bool + Send + Sync + 'static,
        traction: impl Fn(&Point3<f64>) -> SVector<f64, VEC> + Send + Sync + 'static,
    ) -> Self {
        Self {
            location: Box::new(location),
            traction: Box::new(traction),
        }
    }

    pub fn location(&self, x: &Point3<f64>) -> bool {
        (self.location)(x)
    }

    pub fn traction(&self, x: &Point3<f64>) -> SVector<f64, VEC> {
        (self.traction)(x)
    }
}

impl<const VEC: usize> fmt::Debug for NeumannBc<VEC> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeumannBc").finish_non_exhaustive()
    }
}

/// Volumetric load `f(x)` per unit reference volume.
pub struct BodyForce<const VEC: usize>(Box<dyn Fn(&Point3<f64>) -> SVector<f64, VEC> + Send + Sync>);

impl<const VEC: usize> BodyForce<VEC> {
    pub fn new(force: impl Fn(&Point3<f64>) -> SVector<f64, VEC> + Send + Sync + 'static) -> Self {
        Self(Box::new(force))
    }

    pub fn evaluate(&self, x: &Point3<f64>) -> SVector<f64, VEC> {
        (self.0)(x)
    }
}

impl<const VEC: usize> fmt::Debug for BodyForce<VEC> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodyForce").finish()
    }
}

/// The complete boundary-condition specification of a problem.
#[derive(Debug)]
pub struct BoundaryConditions<const VEC: usize> {
    pub dirichlet: Vec<DirichletBc>,
    pub neumann: Vec<NeumannBc<VEC>>,
    pub body_force: Option<BodyForce<VEC>>,
}

impl<const VEC: usize> Default for BoundaryConditions<VEC> {
    fn default() -> Self {
        Self {
            dirichlet: Vec::new(),
            neumann: Vec::new(),
            body_force: None,
        }
    }
}

impl<const VEC: usize> BoundaryConditions<VEC> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirichlet(mut self, bc: DirichletBc) -> Self {
        self.dirichlet.push(bc);
        self
    }

    pub fn with_neumann(mut self, bc: NeumannBc<VEC>) -> Self {
        self.neumann.push(bc);
        self
    }

    pub fn with_body_force(mut self, force: BodyForce<VEC>) -> Self {
        self.body_force = Some(force);
        self
    }
}

/// Dirichlet conditions resolved to constrained degrees of freedom.
///
/// Degrees of freedom are numbered node-major, `dof = node * solution_dim + component`.
/// The complementary free degrees of freedom span the space in which nonlinear solves run.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletBoundaryConditions {
    num_dofs: usize,
    // Sorted by DOF
    constrained: Vec<(usize, f64)>,
    free_dofs: Vec<usize>,
    // Maps each DOF to its index among the free DOFs
    free_index: Vec<Option<usize>>,
}

impl DirichletBoundaryConditions {
    /// Evaluates every condition at every vertex of the mesh.
    ///
    /// Identical duplicate prescriptions are merged; a DOF prescribed two different values is
    /// rejected with [`FemError::ConflictingDirichlet`].
    pub fn resolve(mesh: &HexMesh, solution_dim: usize, conditions: &[DirichletBc]) -> Result<Self, FemError> {
        let mut prescribed = BTreeMap::new();
        for bc in conditions {
            if bc.component >= solution_dim {
                return Err(FemError::InvalidDofComponent {
                    component: bc.component,
                    solution_dim,
                });
            }
            for (node, x) in mesh.vertices().iter().enumerate() {
                if (bc.location)(x) {
                    let dof = node * solution_dim + bc.component;
                    let value = (bc.value)(x);
                    match prescribed.insert(dof, value) {
                        Some(previous) if previous != value => {
                            return Err(FemError::ConflictingDirichlet {
                                dof,
                                first: previous,
                                second: value,
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(Self::from_constrained(mesh.num_vertices() * solution_dim, prescribed.into_iter().collect()))
    }

    fn from_constrained(num_dofs: usize, constrained: Vec<(usize, f64)>) -> Self {
        let mut free_index = vec![Some(0); num_dofs];
        for &(dof, _) in &constrained {
            free_index[dof] = None;
        }
        let mut free_dofs = Vec::with_capacity(num_dofs - constrained.len());
        for (dof, index) in free_index.iter_mut().enumerate() {
            if index.is_some() {
                *index = Some(free_dofs.len());
                free_dofs.push(dof);
            }
        }
        Self {
            num_dofs,
            constrained,
            free_dofs,
            free_index,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_free_dofs(&self) -> usize {
        self.free_dofs.len()
    }

    /// Constrained `(dof, value)` pairs, sorted by DOF.
    pub fn constrained(&self) -> &[(usize, f64)] {
        &self.constrained
    }

    pub fn free_dofs(&self) -> &[usize] {
        &self.free_dofs
    }

    pub fn is_constrained(&self, dof: usize) -> bool {
        self.free_index[dof].is_none()
    }

    /// Overwrites the constrained entries of `u` with their prescribed values.
    pub fn apply(&self, u: &mut DVector<f64>) {
        assert_eq!(u.len(), self.num_dofs);
        for &(dof, value) in &self.constrained {
            u[dof] = value;
        }
    }

    /// Extracts the free entries of a full DOF vector.
    pub fn restrict(&self, full: &DVector<f64>) -> DVector<f64> {
        assert_eq!(full.len(), self.num_dofs);
        DVector::from_iterator(self.free_dofs.len(), self.free_dofs.iter().map(|&dof| full[dof]))
    }

    /// Full DOF vector with the given free values and the prescribed constrained values.
    pub fn expand(&self, free: &DVector<f64>) -> DVector<f64> {
        let mut full = self.expand_homogeneous(free);
        self.apply(&mut full);
        full
    }

    /// Full DOF vector with the given free values and zeros at constrained DOFs.
    ///
    /// This is the embedding of a free-space direction, such as a Newton update.
    pub fn expand_homogeneous(&self, free: &DVector<f64>) -> DVector<f64> {
        assert_eq!(free.len(), self.free_dofs.len());
        let mut full = DVector::zeros(self.num_dofs);
        for (&dof, &value) in self.free_dofs.iter().zip(free.iter()) {
            full[dof] = value;
        }
        full
    }

    /// The free-free block of a full `num_dofs x num_dofs` matrix.
    pub fn restrict_matrix(&self, matrix: &CsrMatrix<f64>) -> CsrMatrix<f64> {
        assert_eq!(matrix.nrows(), self.num_dofs);
        assert_eq!(matrix.ncols(), self.num_dofs);
        let n = self.free_dofs.len();
        let mut coo = CooMatrix::new(n, n);
        for (i, j, &v) in matrix.triplet_iter() {
            if let (Some(i), Some(j)) = (self.free_index[i], self.free_index[j]) {
                coo.push(i, j, v);
            }
        }
        CsrMatrix::from(&coo)
    }
}

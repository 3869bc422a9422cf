//! Errors reported by mesh construction, boundary-condition resolution and design broadcast.
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FemError {
    /// A cell references a vertex that does not exist.
    InvalidConnectivity {
        cell: usize,
        local_index: usize,
        vertex: usize,
        num_vertices: usize,
    },
    /// The determinant of the geometric Jacobian is not strictly positive (or not finite) at
    /// a quadrature point, i.e. the cell is degenerate or inverted.
    ///
    /// `face` is `None` for volume quadrature points.
    DegenerateJacobian {
        cell: usize,
        face: Option<usize>,
        quadrature_point: usize,
        determinant: f64,
    },
    /// A Dirichlet condition names a component outside `0 .. solution_dim`.
    InvalidDofComponent { component: usize, solution_dim: usize },
    /// Two Dirichlet conditions prescribe different values for the same degree of freedom.
    ConflictingDirichlet { dof: usize, first: f64, second: f64 },
    /// The design field is incompatible with the mesh.
    InvalidDesign { reason: String },
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    Quadrature(topofem_quadrature::Error),
}

impl Display for FemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConnectivity {
                cell,
                local_index,
                vertex,
                num_vertices,
            } => write!(
                f,
                "Cell {cell} references vertex {vertex} (local index {local_index}), \
                 but the mesh only has {num_vertices} vertices"
            ),
            Self::DegenerateJacobian {
                cell,
                face,
                quadrature_point,
                determinant,
            } => match face {
                Some(face) => write!(
                    f,
                    "Degenerate Jacobian (det = {determinant:e}) in cell {cell}, \
                     face {face}, face quadrature point {quadrature_point}"
                ),
                None => write!(
                    f,
                    "Degenerate Jacobian (det = {determinant:e}) in cell {cell}, \
                     quadrature point {quadrature_point}"
                ),
            },
            Self::InvalidDofComponent {
                component,
                solution_dim,
            } => write!(
                f,
                "Component {component} is out of bounds for a field with {solution_dim} components"
            ),
            Self::ConflictingDirichlet { dof, first, second } => write!(
                f,
                "Conflicting Dirichlet values for DOF {dof}: {first} and {second}"
            ),
            Self::InvalidDesign { reason } => write!(f, "Invalid design field: {reason}"),
            Self::DimensionMismatch {
                what,
                expected,
                actual,
            } => write!(f, "Dimension mismatch for {what}: expected {expected}, got {actual}"),
            Self::Quadrature(err) => write!(f, "Quadrature error: {err}"),
        }
    }
}

impl Error for FemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Quadrature(err) => Some(err),
            _ => None,
        }
    }
}

impl From<topofem_quadrature::Error> for FemError {
    fn from(err: topofem_quadrature::Error) -> Self {
        Self::Quadrature(err)
    }
}

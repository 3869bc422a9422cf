//! The trilinear hexahedral reference element and its faces.
use crate::connectivity::HEX8_FACE_VERTICES;
use crate::nalgebra::{Matrix3, Point3, SMatrix, SVector, Scalar, Vector3};
use crate::Real;
use numeric_literals::replace_float_literals;

/// Linear Lagrange basis function on `[-1, 1]` that is `1` at `alpha` and `0` at `-alpha`.
#[replace_float_literals(T::from_f64(literal))]
pub fn phi_linear_1d<T: Real>(alpha: T, xi: T) -> T {
    (1.0 + alpha * xi) / 2.0
}

#[replace_float_literals(T::from_f64(literal))]
pub fn phi_linear_1d_grad<T: Real>(alpha: T) -> T {
    alpha / 2.0
}

/// Reference coordinates of the eight Hex8 nodes, in gmsh order.
#[rustfmt::skip]
pub const HEX8_REFERENCE_NODES: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [ 1.0, -1.0, -1.0],
    [ 1.0,  1.0, -1.0],
    [-1.0,  1.0, -1.0],
    [-1.0, -1.0,  1.0],
    [ 1.0, -1.0,  1.0],
    [ 1.0,  1.0,  1.0],
    [-1.0,  1.0,  1.0],
];

/// A trilinear hexahedron defined by its eight vertices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hex8Element<T: Scalar> {
    vertices: [Point3<T>; 8],
}

impl<T> Hex8Element<T>
where
    T: Scalar,
{
    pub fn from_vertices(vertices: [Point3<T>; 8]) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point3<T>; 8] {
        &self.vertices
    }
}

impl<T> Hex8Element<T>
where
    T: Real,
{
    pub fn reference() -> Self {
        Self::from_vertices(HEX8_REFERENCE_NODES.map(|[x, y, z]| {
            Point3::new(T::from_f64(x), T::from_f64(y), T::from_f64(z))
        }))
    }

    /// Basis functions `N_I(xi)` evaluated at the reference coordinate `xi`.
    pub fn evaluate_basis(&self, xi: &Point3<T>) -> SVector<T, 8> {
        SVector::from_fn(|node, _| {
            let alpha = HEX8_REFERENCE_NODES[node];
            (0..3)
                .map(|d| phi_linear_1d(T::from_f64(alpha[d]), xi[d]))
                .fold(T::one(), |acc, phi| acc * phi)
        })
    }

    /// Reference gradients, one column `∇_ξ N_I` per node.
    pub fn gradients(&self, xi: &Point3<T>) -> SMatrix<T, 3, 8> {
        SMatrix::from_fn(|d, node| {
            let alpha = HEX8_REFERENCE_NODES[node];
            (0..3)
                .map(|k| {
                    let alpha_k = T::from_f64(alpha[k]);
                    if k == d {
                        phi_linear_1d_grad(alpha_k)
                    } else {
                        phi_linear_1d(alpha_k, xi[k])
                    }
                })
                .fold(T::one(), |acc, phi| acc * phi)
        })
    }

    fn vertex_matrix(&self) -> SMatrix<T, 3, 8> {
        SMatrix::from_fn(|i, j| self.vertices[j][i])
    }

    #[allow(non_snake_case)]
    pub fn map_reference_coords(&self, xi: &Point3<T>) -> Point3<T> {
        let X = self.vertex_matrix();
        let N = self.evaluate_basis(xi);
        Point3::from(X * N)
    }

    /// The geometric Jacobian `J = ∂x/∂ξ = X Gᵀ`.
    pub fn reference_jacobian(&self, xi: &Point3<T>) -> Matrix3<T> {
        let vertices = self.vertex_matrix();
        let gradients = self.gradients(xi);
        vertices * gradients.transpose()
    }
}

/// The plane `ξ_axis = sign` of the reference cube that contains a local face.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReferenceFace {
    pub axis: usize,
    pub sign: i8,
}

impl ReferenceFace {
    /// Reference face of the given local face index (see [`HEX8_FACE_VERTICES`]).
    pub fn of_local_face(face: usize) -> Option<Self> {
        let vertices = HEX8_FACE_VERTICES.get(face)?;
        // All four vertices of a face share exactly one fixed reference coordinate
        (0..3).find_map(|axis| {
            let value = HEX8_REFERENCE_NODES[vertices[0]][axis];
            vertices
                .iter()
                .all(|&v| HEX8_REFERENCE_NODES[v][axis] == value)
                .then(|| Self {
                    axis,
                    sign: if value > 0.0 { 1 } else { -1 },
                })
        })
    }

    /// The two reference axes that vary over the face, in ascending order.
    pub fn free_axes(&self) -> [usize; 2] {
        match self.axis {
            0 => [1, 2],
            1 => [0, 2],
            _ => [0, 1],
        }
    }

    /// Maps a point of the face quadrature domain `[-1, 1]^2` onto the face.
    pub fn map_to_reference(&self, eta: &[f64; 2]) -> Point3<f64> {
        let mut xi = Point3::origin();
        let [a, b] = self.free_axes();
        xi[a] = eta[0];
        xi[b] = eta[1];
        xi[self.axis] = f64::from(self.sign);
        xi
    }

    /// Outward unit normal of the face in reference coordinates.
    pub fn reference_normal(&self) -> Vector3<f64> {
        let mut n = Vector3::zeros();
        n[self.axis] = f64::from(self.sign);
        n
    }
}

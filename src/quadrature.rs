//! Quadrature tables for Hex8 volume integrals and face integrals.
use crate::element::ReferenceFace;
use crate::error::FemError;
use crate::nalgebra::Point3;
use topofem_quadrature::tensor::{try_hexahedron_gauss, try_quadrilateral_gauss};

/// Default number of Gauss points per reference direction.
pub const DEFAULT_POINTS_PER_DIM: usize = 2;

/// Volume rule on `[-1, 1]^3`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeQuadrature {
    weights: Vec<f64>,
    points: Vec<Point3<f64>>,
}

impl VolumeQuadrature {
    pub fn gauss(points_per_dim: usize) -> Result<Self, FemError> {
        let (weights, points) = try_hexahedron_gauss(points_per_dim)?;
        Ok(Self {
            weights,
            points: points.into_iter().map(Point3::from).collect(),
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// A rule on `[-1, 1]^2` together with its image on each of the six reference faces.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceQuadrature {
    weights: Vec<f64>,
    faces: [ReferenceFace; 6],
    face_points: [Vec<Point3<f64>>; 6],
}

impl FaceQuadrature {
    pub fn gauss(points_per_dim: usize) -> Result<Self, FemError> {
        let (weights, points) = try_quadrilateral_gauss(points_per_dim)?;
        let faces = [0, 1, 2, 3, 4, 5].map(|face| {
            ReferenceFace::of_local_face(face).expect("Every local face index below 6 has a reference face")
        });
        let face_points = faces.map(|face| points.iter().map(|eta| face.map_to_reference(eta)).collect());
        Ok(Self {
            weights,
            faces,
            face_points,
        })
    }

    /// Weights of the two-dimensional rule, shared by all faces.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn reference_face(&self, face: usize) -> &ReferenceFace {
        &self.faces[face]
    }

    /// Quadrature points of the given face, in reference coordinates of the hexahedron.
    pub fn points(&self, face: usize) -> &[Point3<f64>] {
        &self.face_points[face]
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

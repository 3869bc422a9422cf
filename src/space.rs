//! Shape-function and geometry cache for a Hex8 mesh.
use crate::element::Hex8Element;
use crate::error::FemError;
use crate::mesh::{BoundaryFace, HexMesh};
use crate::nalgebra::{Matrix3, Point3, SMatrix, SVector, Vector3};
use crate::quadrature::{FaceQuadrature, VolumeQuadrature};
use log::debug;
use rayon::prelude::*;

/// Physical gradients `J^{-T} ∇_ξ N` and `det J`, or `None` if the Jacobian is degenerate.
fn physical_gradients(
    jacobian: &Matrix3<f64>,
    reference_gradients: &SMatrix<f64, 3, 8>,
) -> Option<(SMatrix<f64, 3, 8>, Matrix3<f64>, f64)> {
    let det = jacobian.determinant();
    if !(det.is_finite() && det > 0.0) {
        return None;
    }
    let j_inv_t = jacobian.try_inverse()?.transpose();
    Some((j_inv_t * reference_gradients, j_inv_t, det))
}

/// Geometry of one face at each of its quadrature points.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceQuadratureData {
    /// Physical quadrature points.
    pub points: Vec<Point3<f64>>,
    /// Outward unit normals.
    pub normals: Vec<Vector3<f64>>,
    /// Surface measure `w · det J · |J^{-T} N|` (Nanson's formula).
    pub nanson_scale: Vec<f64>,
    /// Physical shape-function gradients of the owning cell, one column per node.
    pub shape_gradients: Vec<SMatrix<f64, 3, 8>>,
}

/// Reference basis data shared by all cells, plus the per-cell physical gradients and
/// integration weights at the volume quadrature points.
///
/// Built once; all data is immutable afterwards and safely shared between threads.
#[derive(Debug, Clone)]
pub struct FiniteElementSpace {
    mesh: HexMesh,
    volume_quadrature: VolumeQuadrature,
    face_quadrature: FaceQuadrature,
    shape_values: Vec<SVector<f64, 8>>,
    reference_gradients: Vec<SMatrix<f64, 3, 8>>,
    face_shape_values: [Vec<SVector<f64, 8>>; 6],
    face_reference_gradients: [Vec<SMatrix<f64, 3, 8>>; 6],
    // Cell-major, `num_quads` entries per cell
    shape_gradients: Vec<SMatrix<f64, 3, 8>>,
    jxw: Vec<f64>,
}

impl FiniteElementSpace {
    /// Builds the cache with a tensor Gauss rule of `points_per_dim` points per direction.
    ///
    /// Fails with [`FemError::DegenerateJacobian`] if the geometric Jacobian of any cell is not
    /// positive at any volume or face quadrature point.
    pub fn new(mesh: HexMesh, points_per_dim: usize) -> Result<Self, FemError> {
        let volume_quadrature = VolumeQuadrature::gauss(points_per_dim)?;
        let face_quadrature = FaceQuadrature::gauss(points_per_dim)?;

        let reference = Hex8Element::<f64>::reference();
        let shape_values = volume_quadrature
            .points()
            .iter()
            .map(|xi| reference.evaluate_basis(xi))
            .collect();
        let reference_gradients: Vec<_> = volume_quadrature
            .points()
            .iter()
            .map(|xi| reference.gradients(xi))
            .collect();
        let face_shape_values = [0, 1, 2, 3, 4, 5].map(|face| {
            face_quadrature
                .points(face)
                .iter()
                .map(|xi| reference.evaluate_basis(xi))
                .collect()
        });
        let face_reference_gradients = [0, 1, 2, 3, 4, 5].map(|face| {
            face_quadrature
                .points(face)
                .iter()
                .map(|xi| reference.gradients(xi))
                .collect()
        });

        let per_cell = (0..mesh.num_cells())
            .into_par_iter()
            .map(|cell| {
                let element = mesh.cell_element(cell);
                let mut gradients = Vec::with_capacity(volume_quadrature.len());
                let mut jxw = Vec::with_capacity(volume_quadrature.len());
                for (q, (xi, w)) in volume_quadrature
                    .points()
                    .iter()
                    .zip(volume_quadrature.weights())
                    .enumerate()
                {
                    let jacobian = element.reference_jacobian(xi);
                    let (g, _, det) = physical_gradients(&jacobian, &reference_gradients[q]).ok_or(
                        FemError::DegenerateJacobian {
                            cell,
                            face: None,
                            quadrature_point: q,
                            determinant: jacobian.determinant(),
                        },
                    )?;
                    gradients.push(g);
                    jxw.push(w * det);
                }

                for face in 0..6 {
                    for (q, xi) in face_quadrature.points(face).iter().enumerate() {
                        let jacobian = element.reference_jacobian(xi);
                        let determinant = jacobian.determinant();
                        if !(determinant.is_finite() && determinant > 0.0) {
                            return Err(FemError::DegenerateJacobian {
                                cell,
                                face: Some(face),
                                quadrature_point: q,
                                determinant,
                            });
                        }
                    }
                }
                Ok((gradients, jxw))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (gradients, jxw): (Vec<_>, Vec<_>) = per_cell.into_iter().unzip();
        debug!(
            "Built shape function cache: {} cells, {} volume and {} face quadrature points per cell",
            mesh.num_cells(),
            volume_quadrature.len(),
            face_quadrature.len()
        );

        Ok(Self {
            mesh,
            volume_quadrature,
            face_quadrature,
            shape_values,
            reference_gradients,
            face_shape_values,
            face_reference_gradients,
            shape_gradients: gradients.into_iter().flatten().collect(),
            jxw: jxw.into_iter().flatten().collect(),
        })
    }

    pub fn mesh(&self) -> &HexMesh {
        &self.mesh
    }

    pub fn num_cells(&self) -> usize {
        self.mesh.num_cells()
    }

    pub fn num_vertices(&self) -> usize {
        self.mesh.num_vertices()
    }

    /// Number of volume quadrature points per cell.
    pub fn num_quads(&self) -> usize {
        self.volume_quadrature.len()
    }

    /// Number of quadrature points per face.
    pub fn num_face_quads(&self) -> usize {
        self.face_quadrature.len()
    }

    pub fn volume_quadrature(&self) -> &VolumeQuadrature {
        &self.volume_quadrature
    }

    pub fn face_quadrature(&self) -> &FaceQuadrature {
        &self.face_quadrature
    }

    /// Basis values at the volume quadrature points (identical for every cell).
    pub fn shape_values(&self) -> &[SVector<f64, 8>] {
        &self.shape_values
    }

    pub fn reference_gradients(&self) -> &[SMatrix<f64, 3, 8>] {
        &self.reference_gradients
    }

    /// Basis values at the quadrature points of the given local face.
    pub fn face_shape_values(&self, face: usize) -> &[SVector<f64, 8>] {
        &self.face_shape_values[face]
    }

    /// Physical shape-function gradients of `cell` at each volume quadrature point.
    pub fn shape_gradients(&self, cell: usize) -> &[SMatrix<f64, 3, 8>] {
        let nq = self.num_quads();
        &self.shape_gradients[cell * nq..(cell + 1) * nq]
    }

    /// Integration weights `w_q · det J(ξ_q)` of `cell`.
    pub fn jxw(&self, cell: usize) -> &[f64] {
        let nq = self.num_quads();
        &self.jxw[cell * nq..(cell + 1) * nq]
    }

    /// Physical coordinates of the volume quadrature points of `cell`.
    pub fn quadrature_points(&self, cell: usize) -> Vec<Point3<f64>> {
        let element = self.mesh.cell_element(cell);
        self.volume_quadrature
            .points()
            .iter()
            .map(|xi| element.map_reference_coords(xi))
            .collect()
    }

    pub fn face_quadrature_data(&self, boundary_face: &BoundaryFace) -> FaceQuadratureData {
        let BoundaryFace { cell, face } = *boundary_face;
        let element = self.mesh.cell_element(cell);
        let reference_normal = self.face_quadrature.reference_face(face).reference_normal();
        let num_points = self.num_face_quads();

        let mut data = FaceQuadratureData {
            points: Vec::with_capacity(num_points),
            normals: Vec::with_capacity(num_points),
            nanson_scale: Vec::with_capacity(num_points),
            shape_gradients: Vec::with_capacity(num_points),
        };

        for (q, (xi, w)) in self
            .face_quadrature
            .points(face)
            .iter()
            .zip(self.face_quadrature.weights())
            .enumerate()
        {
            let jacobian = element.reference_jacobian(xi);
            let (gradients, j_inv_t, det) =
                physical_gradients(&jacobian, &self.face_reference_gradients[face][q])
                    .expect("Face Jacobians are validated when the space is constructed");
            let n = j_inv_t * reference_normal;
            let n_norm = n.norm();
            data.points.push(element.map_reference_coords(xi));
            data.normals.push(n / n_norm);
            data.nanson_scale.push(w * det * n_norm);
            data.shape_gradients.push(gradients);
        }
        data
    }
}

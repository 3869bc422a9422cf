use crate::connectivity::Hex8Connectivity;
use crate::element::Hex8Element;
use crate::error::FemError;
use crate::nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod procedural;

/// A face of a cell, identified by the cell index and the local face index.
///
/// Local face indices follow [`HEX8_FACE_VERTICES`](crate::connectivity::HEX8_FACE_VERTICES).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryFace {
    pub cell: usize,
    pub face: usize,
}

/// Index-based conforming mesh of trilinear hexahedra.
///
/// Every connectivity index is validated at construction, so the mesh can be indexed freely
/// afterwards. The mesh is immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexMesh {
    vertices: Vec<Point3<f64>>,
    connectivity: Vec<Hex8Connectivity>,
}

impl HexMesh {
    /// Construct a mesh from vertices and connectivity.
    ///
    /// Returns [`FemError::InvalidConnectivity`] for the first cell that references a
    /// non-existent vertex.
    pub fn try_from_vertices_and_connectivity(
        vertices: Vec<Point3<f64>>,
        connectivity: Vec<Hex8Connectivity>,
    ) -> Result<Self, FemError> {
        let num_vertices = vertices.len();
        for (cell, conn) in connectivity.iter().enumerate() {
            if let Some((local_index, &vertex)) = conn
                .vertex_indices()
                .iter()
                .enumerate()
                .find(|(_, v)| **v >= num_vertices)
            {
                return Err(FemError::InvalidConnectivity {
                    cell,
                    local_index,
                    vertex,
                    num_vertices,
                });
            }
        }
        Ok(Self {
            vertices,
            connectivity,
        })
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Hex8Connectivity] {
        &self.connectivity
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    pub fn cell_vertices(&self, cell: usize) -> [Point3<f64>; 8] {
        self.connectivity[cell].0.map(|v| self.vertices[v])
    }

    pub fn cell_element(&self, cell: usize) -> Hex8Element<f64> {
        Hex8Element::from_vertices(self.cell_vertices(cell))
    }

    /// The arithmetic mean of the vertices of each cell.
    pub fn cell_centroids(&self) -> Vec<Point3<f64>> {
        (0..self.num_cells())
            .map(|cell| {
                let sum = self
                    .cell_vertices(cell)
                    .iter()
                    .fold(Vector3::zeros(), |acc, v| acc + v.coords);
                Point3::from(sum / 8.0)
            })
            .collect()
    }

    /// Returns a translated copy of the mesh.
    pub fn translated(mut self, translation: &Vector3<f64>) -> Self {
        self.vertices.iter_mut().for_each(|v| *v += translation);
        self
    }

    /// Finds faces which are only connected to exactly one cell, sorted by cell and local face.
    pub fn find_boundary_faces(&self) -> Vec<BoundaryFace> {
        // Use a BTreeMap to avoid non-determinism due to HashMap's internal randomization
        let mut face_counts = BTreeMap::new();
        for (cell, conn) in self.connectivity.iter().enumerate() {
            for face in 0..conn.num_faces() {
                if let Some(mut key) = conn.get_face_connectivity(face) {
                    key.sort_unstable();
                    face_counts
                        .entry(key)
                        .and_modify(|(_, count)| *count += 1)
                        .or_insert((BoundaryFace { cell, face }, 1));
                }
            }
        }

        let mut faces: Vec<_> = face_counts
            .into_values()
            .filter(|&(_, count)| count == 1)
            .map(|(face, _)| face)
            .collect();
        faces.sort_unstable();
        faces
    }

    /// Boundary faces whose four vertices all satisfy `location`.
    pub fn select_boundary_faces(&self, location: impl Fn(&Point3<f64>) -> bool) -> Vec<BoundaryFace> {
        self.find_boundary_faces()
            .into_iter()
            .filter(|face| {
                self.connectivity[face.cell]
                    .get_face_connectivity(face.face)
                    .map(|vertices| vertices.iter().all(|&v| location(&self.vertices[v])))
                    .unwrap_or(false)
            })
            .collect()
    }
}

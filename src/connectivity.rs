use serde::{Deserialize, Serialize};

/// Local vertex indices of the six faces of a hexahedron.
///
/// Faces are ordered so that their normals (right-hand rule) point towards the exterior of
/// the cell, which gives proper outward normals on the boundary.
pub const HEX8_FACE_VERTICES: [[usize; 4]; 6] = [
    [3, 2, 1, 0],
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [4, 7, 3, 0],
    [5, 6, 7, 4],
];

/// Connectivity for a 3D tri-linear Hex element.
///
/// The node ordering is the same as defined by gmsh (and VTK): the bottom face counter-clockwise
/// followed by the top face counter-clockwise, see
/// <http://gmsh.info/doc/texinfo/gmsh.html#Low-order-elements> for more information.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hex8Connectivity(pub [usize; 8]);

impl Hex8Connectivity {
    pub fn num_faces(&self) -> usize {
        HEX8_FACE_VERTICES.len()
    }

    /// Global vertex indices of the given local face, outward oriented.
    pub fn get_face_connectivity(&self, index: usize) -> Option<[usize; 4]> {
        HEX8_FACE_VERTICES
            .get(index)
            .map(|face| face.map(|local| self.0[local]))
    }

    pub fn vertex_indices(&self) -> &[usize] {
        &self.0
    }
}

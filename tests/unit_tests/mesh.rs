use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Point3, Vector3};
use topofem::connectivity::Hex8Connectivity;
use topofem::error::FemError;
use topofem::mesh::procedural::{
    create_cylinder_hex_mesh, create_rectangular_uniform_hex_mesh, create_unit_box_uniform_hex_mesh,
};
use topofem::mesh::{BoundaryFace, HexMesh};

#[test]
fn out_of_range_connectivity_is_rejected() {
    let mesh = create_unit_box_uniform_hex_mesh(1);
    let mut conn = mesh.connectivity()[0];
    conn.0[5] = 8;
    let result = HexMesh::try_from_vertices_and_connectivity(mesh.vertices().to_vec(), vec![conn]);
    assert_eq!(
        result.unwrap_err(),
        FemError::InvalidConnectivity {
            cell: 0,
            local_index: 5,
            vertex: 8,
            num_vertices: 8
        }
    );
}

#[test]
fn rectangular_mesh_dimensions() {
    let mesh = create_rectangular_uniform_hex_mesh(0.5, 2, 1, 3, 2);
    assert_eq!(mesh.num_cells(), 4 * 2 * 6);
    assert_eq!(mesh.num_vertices(), 5 * 3 * 7);
    let max = mesh
        .vertices()
        .iter()
        .fold(Vector3::repeat(f64::MIN), |max, v| max.sup(&v.coords));
    assert_matrix_eq!(max, Vector3::new(1.0, 0.5, 1.5), comp = abs, tol = 1e-14);

    let empty = create_rectangular_uniform_hex_mesh(1.0, 0, 1, 1, 1);
    assert_eq!(empty.num_cells(), 0);
    assert_eq!(empty.num_vertices(), 0);
}

#[test]
fn cell_centroids_and_translation() {
    let mesh = create_unit_box_uniform_hex_mesh(2);
    let centroids = mesh.cell_centroids();
    assert_eq!(centroids.len(), 8);
    assert_matrix_eq!(centroids[0].coords, Vector3::repeat(0.25), comp = abs, tol = 1e-14);
    assert_matrix_eq!(centroids[7].coords, Vector3::repeat(0.75), comp = abs, tol = 1e-14);

    let translation = Vector3::new(1.0, -2.0, 3.0);
    let translated = mesh.clone().translated(&translation);
    assert_eq!(translated.connectivity(), mesh.connectivity());
    for (a, b) in translated.cell_centroids().iter().zip(&centroids) {
        assert_matrix_eq!(a.coords, b.coords + translation, comp = abs, tol = 1e-14);
    }
}

#[test]
fn single_cell_boundary_faces() {
    let mesh = create_unit_box_uniform_hex_mesh(1);
    let faces = mesh.find_boundary_faces();
    let expected: Vec<_> = (0..6).map(|face| BoundaryFace { cell: 0, face }).collect();
    assert_eq!(faces, expected);
}

#[test]
fn box_boundary_faces() {
    let mesh = create_unit_box_uniform_hex_mesh(2);
    let faces = mesh.find_boundary_faces();
    assert_eq!(faces.len(), 6 * 4);

    // Interior faces are shared by two cells
    let conn = mesh.connectivity();
    for face in &faces {
        let vertices = conn[face.cell].get_face_connectivity(face.face).unwrap();
        let on_boundary = |v: usize| {
            let x = mesh.vertices()[v];
            x.coords.iter().any(|&c| c == 0.0 || c == 1.0)
        };
        assert!(vertices.iter().all(|&v| on_boundary(v)));
    }

    let bottom = mesh.select_boundary_faces(|x| x.z == 0.0);
    assert_eq!(bottom.len(), 4);
    assert!(bottom.iter().all(|face| face.face == 0));

    let top = mesh.select_boundary_faces(|x| x.z == 1.0);
    assert_eq!(top.len(), 4);
    assert!(top.iter().all(|face| face.face == 5));

    // An edge is not a face
    assert!(mesh.select_boundary_faces(|x| x.x == 0.0 && x.y == 0.0).is_empty());
}

#[test]
fn cylinder_mesh() {
    let (radius, height, n, layers) = (2.0, 5.0, 4, 3);
    let mesh = create_cylinder_hex_mesh(radius, height, n, layers);
    assert_eq!(mesh.num_cells(), n * n * layers);
    assert_eq!(mesh.num_vertices(), (n + 1) * (n + 1) * (layers + 1));

    for v in mesh.vertices() {
        let r = v.coords.xy().norm();
        assert!(r <= radius + 1e-12);
        assert!(v.z >= 0.0 && v.z <= height + 1e-12);
    }

    let faces = mesh.find_boundary_faces();
    assert_eq!(faces.len(), 2 * n * n + 4 * n * layers);

    // The lateral boundary lies on the cylinder
    let lateral = mesh.select_boundary_faces(|x| (x.coords.xy().norm() - radius).abs() < 1e-12);
    assert_eq!(lateral.len(), 4 * n * layers);
    let bottom = mesh.select_boundary_faces(|x| x.z.abs() < 1e-12);
    assert_eq!(bottom.len(), n * n);

    // Cells keep the orientation of the structured grid
    for cell in 0..mesh.num_cells() {
        let element = mesh.cell_element(cell);
        let jacobian = element.reference_jacobian(&Point3::origin());
        assert!(jacobian.determinant() > 0.0);
    }
    let centroid = mesh
        .cell_centroids()
        .iter()
        .fold(Vector3::zeros(), |acc, c| acc + c.coords)
        / mesh.num_cells() as f64;
    assert_scalar_eq!(centroid.x, 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(centroid.y, 0.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(centroid.z, 0.5 * height, comp = abs, tol = 1e-12);
}

#[test]
fn mesh_serializes_to_json() {
    let mesh = HexMesh::try_from_vertices_and_connectivity(
        create_unit_box_uniform_hex_mesh(1).vertices().to_vec(),
        vec![Hex8Connectivity([0, 1, 3, 2, 4, 5, 7, 6])],
    )
    .unwrap();
    let json = serde_json::to_string(&mesh).unwrap();
    let deserialized: HexMesh = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, mesh);
}

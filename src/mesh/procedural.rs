//! Basic procedural mesh generation routines.
use crate::connectivity::Hex8Connectivity;
use crate::mesh::HexMesh;
use crate::nalgebra::{Point2, Point3};

/// Builds the structured `(nx + 1) x (ny + 1) x (nz + 1)` vertex grid connectivity, with
/// vertices numbered x-fastest.
fn structured_hex_connectivity(num_cells_x: usize, num_cells_y: usize, num_cells_z: usize) -> Vec<Hex8Connectivity> {
    let num_vertices_x = num_cells_x + 1;
    let num_vertices_y = num_cells_y + 1;
    let idx = |i: usize, j: usize, k: usize| (num_vertices_x * num_vertices_y) * k + num_vertices_x * j + i;

    let mut cells = Vec::with_capacity(num_cells_x * num_cells_y * num_cells_z);
    for k in 0..num_cells_z {
        for j in 0..num_cells_y {
            for i in 0..num_cells_x {
                cells.push(Hex8Connectivity([
                    idx(i, j, k),
                    idx(i + 1, j, k),
                    idx(i + 1, j + 1, k),
                    idx(i, j + 1, k),
                    idx(i, j, k + 1),
                    idx(i + 1, j, k + 1),
                    idx(i + 1, j + 1, k + 1),
                    idx(i, j + 1, k + 1),
                ]));
            }
        }
    }
    cells
}

fn structured_mesh(vertices: Vec<Point3<f64>>, cells: Vec<Hex8Connectivity>) -> HexMesh {
    HexMesh::try_from_vertices_and_connectivity(vertices, cells)
        .expect("Structured connectivity only references existing vertices")
}

/// Axis-aligned box `[0, units_x] x [0, units_y] x [0, units_z]` (scaled by `unit_length`)
/// of uniform cubic cells.
pub fn create_rectangular_uniform_hex_mesh(
    unit_length: f64,
    units_x: usize,
    units_y: usize,
    units_z: usize,
    cells_per_unit: usize,
) -> HexMesh {
    if cells_per_unit == 0 || units_x == 0 || units_y == 0 || units_z == 0 {
        return structured_mesh(Vec::new(), Vec::new());
    }

    let cell_size = unit_length / cells_per_unit as f64;
    let num_cells_x = units_x * cells_per_unit;
    let num_cells_y = units_y * cells_per_unit;
    let num_cells_z = units_z * cells_per_unit;

    let mut vertices = Vec::new();
    for k in 0..=num_cells_z {
        for j in 0..=num_cells_y {
            for i in 0..=num_cells_x {
                vertices.push(Point3::new(
                    i as f64 * cell_size,
                    j as f64 * cell_size,
                    k as f64 * cell_size,
                ));
            }
        }
    }

    structured_mesh(vertices, structured_hex_connectivity(num_cells_x, num_cells_y, num_cells_z))
}

/// The unit cube `[0, 1]^3` with `cells_per_dim` cells along each axis.
pub fn create_unit_box_uniform_hex_mesh(cells_per_dim: usize) -> HexMesh {
    create_rectangular_uniform_hex_mesh(1.0, 1, 1, 1, cells_per_dim)
}

/// Maps the square `[-1, 1]^2` onto the unit disk.
///
/// Points at "square radius" `r = max(|x|, |y|)` are blended from the square towards the
/// circle of radius `r`, so that the center stays undistorted and the boundary of the square
/// lands exactly on the unit circle. The map is radial and strictly increasing along every ray,
/// so it preserves orientation.
fn square_to_disk(p: &Point2<f64>) -> Point2<f64> {
    let r_square = p.x.abs().max(p.y.abs());
    let r = p.coords.norm();
    if r == 0.0 {
        return *p;
    }
    let scale = (1.0 - r_square) + r_square * r_square / r;
    Point2::from(p.coords * scale)
}

/// Cylinder of the given radius, with its axis along `z` from `z = 0` to `z = height`.
///
/// The cross-section is a structured `cells_per_side x cells_per_side` grid on the square,
/// mapped to the disk (an "O-grid" without a separate core block), extruded into `num_layers`
/// layers of cells.
pub fn create_cylinder_hex_mesh(radius: f64, height: f64, cells_per_side: usize, num_layers: usize) -> HexMesh {
    if cells_per_side == 0 || num_layers == 0 {
        return structured_mesh(Vec::new(), Vec::new());
    }

    let n = cells_per_side;
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1) * (num_layers + 1));
    for k in 0..=num_layers {
        let z = height * k as f64 / num_layers as f64;
        for j in 0..=n {
            for i in 0..=n {
                let square = Point2::new(-1.0 + 2.0 * i as f64 / n as f64, -1.0 + 2.0 * j as f64 / n as f64);
                let disk = square_to_disk(&square);
                vertices.push(Point3::new(radius * disk.x, radius * disk.y, z));
            }
        }
    }

    structured_mesh(vertices, structured_hex_connectivity(n, n, num_layers))
}

//! Tensor-product Gauss rules for the reference quadrilateral `[-1, 1]^2` and the reference
//! hexahedron `[-1, 1]^3`.
//!
//! Points are ordered lexicographically with the *first* coordinate varying slowest.

use crate::univariate::try_gauss;
use crate::{Error, Point, Rule};

fn tensor_product<const D: usize>(num_points_per_dim: usize) -> Result<Rule<D>, Error> {
    let (weights1d, points1d) = try_gauss(num_points_per_dim)?;
    let n = num_points_per_dim;
    let total = n.pow(D as u32);

    let mut weights = Vec::with_capacity(total);
    let mut points = Vec::with_capacity(total);
    for linear_index in 0..total {
        let mut point: Point<D> = [0.0; D];
        let mut w = 1.0;
        let mut remainder = linear_index;
        for d in (0..D).rev() {
            let i = remainder % n;
            remainder /= n;
            point[d] = points1d[i][0];
            w *= weights1d[i];
        }
        weights.push(w);
        points.push(point);
    }
    Ok((weights, points))
}

/// A Gauss rule for the reference quadrilateral with `num_points_per_dim` points along each
/// axis.
pub fn try_quadrilateral_gauss(num_points_per_dim: usize) -> Result<Rule<2>, Error> {
    tensor_product(num_points_per_dim)
}

/// A Gauss rule for the reference hexahedron with `num_points_per_dim` points along each axis.
pub fn try_hexahedron_gauss(num_points_per_dim: usize) -> Result<Rule<3>, Error> {
    tensor_product(num_points_per_dim)
}

/// Panicking variant of [`try_quadrilateral_gauss`].
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule<2> {
    try_quadrilateral_gauss(num_points_per_dim).expect("number of points must be positive")
}

/// Panicking variant of [`try_hexahedron_gauss`].
pub fn hexahedron_gauss(num_points_per_dim: usize) -> Rule<3> {
    try_hexahedron_gauss(num_points_per_dim).expect("number of points must be positive")
}

//! Gauss–Legendre rules on the interval `[-1, 1]`.

use crate::{Error, Rule};
use std::f64::consts::PI;

/// Upper bound on Newton iterations per root. Convergence is quadratic from the
/// Chebyshev-like initial guess, so this is never reached in practice.
const MAX_ROOT_ITERATIONS: usize = 100;

/// Evaluates the Legendre polynomial $P_n$ and its derivative at `x`.
///
/// Only valid in the open interval `(-1, 1)`, where the derivative formula is defined.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    // Bonnet's recursion: m P_m = (2m - 1) x P_{m-1} - (m - 1) P_{m-2}
    let (mut p_prev, mut p) = (0.0, 1.0);
    for m in 1..=n {
        let m = m as f64;
        let p_next = ((2.0 * m - 1.0) * x * p - (m - 1.0) * p_prev) / m;
        p_prev = p;
        p = p_next;
    }
    let dp = n as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, dp)
}

/// Gauss–Legendre rule with `num_points` points, or an error if the roots could not be
/// resolved to machine precision.
///
/// With `n` points the rule integrates polynomials up to degree `2n - 1` exactly. Points are
/// returned in descending order.
pub fn try_gauss(num_points: usize) -> Result<Rule<1>, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    let mut points = vec![[0.0]; n];
    let mut weights = vec![0.0; n];

    // Roots are symmetric about the origin, so only the positive half is computed
    for i in 0..(n + 1) / 2 {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut converged = false;
        for _ in 0..MAX_ROOT_ITERATIONS {
            let (p, dp) = legendre(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() <= 1e-15 {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(Error::RootFindingFailed { num_points: n });
        }

        let (_, dp) = legendre(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        points[i] = [x];
        points[n - 1 - i] = [-x];
        weights[i] = w;
        weights[n - 1 - i] = w;
    }

    Ok((weights, points))
}

/// Gauss–Legendre rule with `num_points` points.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    assert!(num_points > 0, "number of points must be positive");
    try_gauss(num_points).expect("Gauss-Legendre root finding does not fail for positive n")
}

//! Quadrature rules for the hexahedral reference domain `[-1, 1]^3` and its faces.
//!
//! A rule is a pair `(weights, points)` of equal length. All rules here are Gauss–Legendre
//! rules or tensor products of them, so weights are strictly positive.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod tensor;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// No rule with the requested number of points exists.
    NoRuleAvailable,
    /// Newton iterations for the Legendre roots did not converge.
    RootFindingFailed { num_points: usize },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(f, "There is no quadrature rule satisfying the requirements available")
            }
            Self::RootFindingFailed { num_points } => {
                write!(f, "Failed to compute the roots of the Legendre polynomial of degree {num_points}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A two-dimensional quadrature rule.
pub type Rule2d = Rule<2>;

/// A three-dimensional rule.
pub type Rule3d = Rule<3>;

/// Approximates the integral of `f` over the rule's reference domain.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, x)| w * f(x)).sum()
}

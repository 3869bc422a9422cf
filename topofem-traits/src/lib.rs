use nalgebra::Scalar;
use num::{One, Zero};
use std::fmt::Display;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

pub use nalgebra;

/// Forward-mode automatic differentiation
pub mod dual;

pub use dual::Dual;

/// The scalar type used by all generic numerical routines in `topofem`.
///
/// Besides `f64`, the trait is implemented by [`Dual<T>`] for any `T: Real`, which means that
/// constitutive laws and element routines written once against `Real` can be evaluated on plain
/// values, on values carrying a first derivative (`Dual<f64>`) and on values carrying
/// derivatives of derivatives (`Dual<Dual<f64>>`).
///
/// The arithmetic supertraits are exactly what `nalgebra` needs for matrix products, traces and
/// the like on small fixed-size matrices. Operations that require `nalgebra::RealField`
/// (norms, decompositions) are deliberately not available for generic `T`.
pub trait Real:
    Scalar
    + Copy
    + Display
    + PartialOrd
    + Send
    + Sync
    + Zero
    + One
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// Lift a constant into the scalar type.
    ///
    /// For dual numbers, all derivative components of the result are zero.
    fn from_f64(value: f64) -> Self;

    /// The primal (non-derivative) value.
    fn value(&self) -> f64;

    fn sqrt(self) -> Self;

    fn powf(self, exponent: f64) -> Self;

    fn powi(self, exponent: i32) -> Self;

    fn abs(self) -> Self;

    fn ln(self) -> Self;

    fn exp(self) -> Self;

    /// Returns `true` if the value and every derivative component are finite.
    fn is_finite(&self) -> bool;

    fn from_usize(value: usize) -> Self {
        Self::from_f64(value as f64)
    }
}

impl Real for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn value(&self) -> f64 {
        *self
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn powf(self, exponent: f64) -> Self {
        f64::powf(self, exponent)
    }

    fn powi(self, exponent: i32) -> Self {
        f64::powi(self, exponent)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

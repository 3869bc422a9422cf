//! Dual numbers $a + b \epsilon$ with $\epsilon^2 = 0$.
//!
//! Evaluating a function on `Dual::new(x, v)` yields `Dual::new(f(x), f'(x) v)`, i.e. the
//! directional derivative is propagated alongside the value by the chain rule. Since `Dual<T>`
//! is itself [`Real`] whenever `T` is, duals can be nested to obtain second derivatives.
use crate::Real;
use nalgebra::SMatrix;
use num::{One, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Dual<T> {
    /// The value.
    pub re: T,
    /// The derivative component.
    pub eps: T,
}

impl<T> Dual<T> {
    pub fn new(re: T, eps: T) -> Self {
        Self { re, eps }
    }
}

impl<T: Real> Dual<T> {
    /// A dual number with zero derivative.
    pub fn constant(re: T) -> Self {
        Self::new(re, T::zero())
    }

    /// A dual number seeded with unit derivative.
    pub fn variable(re: T) -> Self {
        Self::new(re, T::one())
    }
}

/// Ordering only considers the value, so that branches in generic code (e.g. `abs`) follow the
/// same path as the undifferentiated computation.
impl<T: PartialOrd> PartialOrd for Dual<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.re.partial_cmp(&other.re)
    }
}

impl<T: fmt::Display> fmt::Display for Dual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl<T: Real> Add for Dual<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.eps + rhs.eps)
    }
}

impl<T: Real> Sub for Dual<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.eps - rhs.eps)
    }
}

impl<T: Real> Mul for Dual<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.re * rhs.re, self.re * rhs.eps + self.eps * rhs.re)
    }
}

impl<T: Real> Div for Dual<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let re = self.re / rhs.re;
        Self::new(re, (self.eps - re * rhs.eps) / rhs.re)
    }
}

impl<T: Real> Neg for Dual<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.re, -self.eps)
    }
}

impl<T: Real> AddAssign for Dual<T> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: Real> SubAssign for Dual<T> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<T: Real> MulAssign for Dual<T> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<T: Real> DivAssign for Dual<T> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<T: Real> Zero for Dual<T> {
    fn zero() -> Self {
        Self::constant(T::zero())
    }

    fn is_zero(&self) -> bool {
        self.re.is_zero() && self.eps.is_zero()
    }
}

impl<T: Real> One for Dual<T> {
    fn one() -> Self {
        Self::constant(T::one())
    }
}

impl<T: Real> Real for Dual<T> {
    fn from_f64(value: f64) -> Self {
        Self::constant(T::from_f64(value))
    }

    fn value(&self) -> f64 {
        self.re.value()
    }

    fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        Self::new(s, self.eps / (T::from_f64(2.0) * s))
    }

    fn powf(self, exponent: f64) -> Self {
        let d = T::from_f64(exponent) * self.re.powf(exponent - 1.0);
        Self::new(self.re.powf(exponent), self.eps * d)
    }

    fn powi(self, exponent: i32) -> Self {
        if exponent == 0 {
            Self::one()
        } else {
            let d = T::from_f64(exponent as f64) * self.re.powi(exponent - 1);
            Self::new(self.re.powi(exponent), self.eps * d)
        }
    }

    fn abs(self) -> Self {
        if self.re < T::zero() {
            -self
        } else {
            self
        }
    }

    fn ln(self) -> Self {
        Self::new(self.re.ln(), self.eps / self.re)
    }

    fn exp(self) -> Self {
        let e = self.re.exp();
        Self::new(e, self.eps * e)
    }

    fn is_finite(&self) -> bool {
        self.re.is_finite() && self.eps.is_finite()
    }
}

/// Derivative of the scalar function `f` at `x`.
pub fn derivative<T, F>(f: F, x: T) -> T
where
    T: Real,
    F: FnOnce(Dual<T>) -> Dual<T>,
{
    f(Dual::variable(x)).eps
}

/// Gradient of a scalar function of a fixed-size matrix argument.
///
/// The entry `(i, j)` of the result is $\partial f / \partial x_{ij}$. One forward pass is
/// performed per entry of `x`.
pub fn gradient<T, F, const R: usize, const C: usize>(f: F, x: &SMatrix<T, R, C>) -> SMatrix<T, R, C>
where
    T: Real,
    F: Fn(&SMatrix<Dual<T>, R, C>) -> Dual<T>,
{
    let mut seeded = x.map(Dual::constant);
    let mut grad = SMatrix::<T, R, C>::zeros();
    for k in 0..R * C {
        seeded[k].eps = T::one();
        grad[k] = f(&seeded).eps;
        seeded[k].eps = T::zero();
    }
    grad
}

/// Directional derivative of a matrix-valued function of a matrix argument.
///
/// Returns $\mathrm{d}f(x)[v]$ using a single forward pass.
pub fn directional_derivative<T, F, const R: usize, const C: usize, const RO: usize, const CO: usize>(
    f: F,
    x: &SMatrix<T, R, C>,
    v: &SMatrix<T, R, C>,
) -> SMatrix<T, RO, CO>
where
    T: Real,
    F: FnOnce(&SMatrix<Dual<T>, R, C>) -> SMatrix<Dual<T>, RO, CO>,
{
    let seeded = x.zip_map(v, Dual::new);
    f(&seeded).map(|y| y.eps)
}

use crate::cg::LinearOperator;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

/// Diagonal (Jacobi) preconditioner `P = diag(A)^{-1}`.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobiPreconditioner<T: RealField> {
    inverse_diagonal: DVector<T>,
}

impl<T: RealField + Copy> JacobiPreconditioner<T> {
    /// Returns `None` unless every diagonal entry is finite and strictly positive, which is
    /// what an SPD operator has.
    pub fn from_diagonal(diagonal: &DVector<T>) -> Option<Self> {
        if diagonal.iter().all(|d| d.is_finite() && *d > T::zero()) {
            Some(Self {
                inverse_diagonal: diagonal.map(|d| T::one() / d),
            })
        } else {
            None
        }
    }

    pub fn from_csr(matrix: &CsrMatrix<T>) -> Option<Self> {
        assert_eq!(matrix.nrows(), matrix.ncols(), "Matrix must be square");
        let mut diagonal = DVector::zeros(matrix.nrows());
        for (i, j, v) in matrix.triplet_iter() {
            if i == j {
                diagonal[i] += *v;
            }
        }
        Self::from_diagonal(&diagonal)
    }

    pub fn inverse_diagonal(&self) -> &DVector<T> {
        &self.inverse_diagonal
    }
}

impl<T: RealField + Copy> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        if x.len() != self.inverse_diagonal.len() {
            return Err(Box::from(format!(
                "Dimension mismatch: preconditioner has dimension {}, vector has length {}",
                self.inverse_diagonal.len(),
                x.len()
            )));
        }
        y.copy_from(&x.component_mul(&self.inverse_diagonal));
        Ok(())
    }
}

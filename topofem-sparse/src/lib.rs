//! Linear solvers used by the Newton linearization in `topofem`.
//!
//! Iterative solvers operate on the [`cg::LinearOperator`] abstraction, so the same solver can
//! be driven by an assembled [`CsrMatrix`] or by a matrix-free Jacobian-vector product.

pub mod cg;
pub mod preconditioners;

pub use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};

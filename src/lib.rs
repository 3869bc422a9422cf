//! Finite element assembly and nonlinear solves on trilinear hexahedral meshes, with a per-cell
//! design field for density-based topology optimization.
//!
//! Every derivative the library needs is obtained by evaluating generic code on dual numbers
//! (see [`Real`] and [`Dual`]): the Newton linearization, Jacobian-vector products and the
//! sensitivity of the residual with respect to the design.
pub mod assembly;
pub mod boundary;
pub mod connectivity;
pub mod design;
pub mod element;
pub mod error;
pub mod mesh;
pub mod problem;
pub mod quadrature;
pub mod solver;
pub mod space;

pub mod optimize {
    pub use topofem_optimize::*;
}

pub mod sparse {
    pub use topofem_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use topofem_traits::{Dual, Real};

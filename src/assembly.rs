//! Weak-form assembly.
//!
//! The element routines in [`local`] are generic over the scalar type, so that the very same
//! residual code yields the residual itself (`f64`), its linearization and design sensitivities
//! (`Dual<f64>`). [`global`] maps them over all cells in parallel and scatter-adds the results
//! in cell order.
pub mod global;
pub mod local;
pub mod operators;

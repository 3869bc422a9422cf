//! Per-cell design parameters and their broadcast to quadrature points.
use crate::error::FemError;
use crate::nalgebra::{DVector, Scalar};
use crate::Real;
use serde::{Deserialize, Serialize};

/// Design parameters of the flexible cells.
///
/// `params[k]` is the design value of cell `flex_inds[k]`. Cells that are not flexible keep full
/// material (`1.0`). The field is owned by the caller and passed into every evaluation that
/// depends on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignField {
    params: DVector<f64>,
    flex_inds: Vec<usize>,
}

impl DesignField {
    pub fn new(params: DVector<f64>, flex_inds: Vec<usize>) -> Result<Self, FemError> {
        if params.len() != flex_inds.len() {
            return Err(FemError::InvalidDesign {
                reason: format!(
                    "{} parameters were given for {} flexible cells",
                    params.len(),
                    flex_inds.len()
                ),
            });
        }
        if let Some(k) = params.iter().position(|p| !p.is_finite()) {
            return Err(FemError::InvalidDesign {
                reason: format!("parameter {k} is not finite"),
            });
        }
        let mut sorted = flex_inds.clone();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(FemError::InvalidDesign {
                reason: format!("cell {} is listed as flexible more than once", pair[0]),
            });
        }
        Ok(Self { params, flex_inds })
    }

    /// Every cell flexible, with the same value.
    pub fn uniform(num_cells: usize, value: f64) -> Self {
        Self {
            params: DVector::repeat(num_cells, value),
            flex_inds: (0..num_cells).collect(),
        }
    }

    pub fn params(&self) -> &DVector<f64> {
        &self.params
    }

    pub fn flex_inds(&self) -> &[usize] {
        &self.flex_inds
    }

    /// Replaces the parameter values, keeping the flexible cells.
    pub fn with_params(&self, params: DVector<f64>) -> Result<Self, FemError> {
        Self::new(params, self.flex_inds.clone())
    }

    /// One value per cell: the parameter of flexible cells, `1.0` elsewhere.
    pub fn full_params(&self, num_cells: usize) -> Result<DVector<f64>, FemError> {
        let mut full = DVector::repeat(num_cells, 1.0);
        for (&cell, &p) in self.flex_inds.iter().zip(self.params.iter()) {
            if cell >= num_cells {
                return Err(FemError::InvalidDesign {
                    reason: format!("flexible cell {cell} does not exist in a mesh with {num_cells} cells"),
                });
            }
            full[cell] = p;
        }
        Ok(full)
    }

    /// Broadcasts [`full_params`](Self::full_params) to every quadrature point of each cell.
    pub fn set_params(&self, num_cells: usize, num_quads: usize) -> Result<QuadratureField<f64>, FemError> {
        let full = self.full_params(num_cells)?;
        Ok(QuadratureField::from_cell_values(full.as_slice(), num_quads))
    }
}

/// A scalar per quadrature point, stored cell-major (`num_cells x num_quads`).
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureField<T: Scalar> {
    values: Vec<T>,
    num_quads: usize,
}

impl<T: Real> QuadratureField<T> {
    /// Repeats each cell value across the `num_quads` points of the cell.
    pub fn from_cell_values(cell_values: &[T], num_quads: usize) -> Self {
        let values = cell_values
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(num_quads))
            .collect();
        Self { values, num_quads }
    }

    pub fn uniform(num_cells: usize, num_quads: usize, value: T) -> Self {
        Self {
            values: vec![value; num_cells * num_quads],
            num_quads,
        }
    }

    pub fn num_cells(&self) -> usize {
        if self.num_quads == 0 {
            0
        } else {
            self.values.len() / self.num_quads
        }
    }

    pub fn num_quads(&self) -> usize {
        self.num_quads
    }

    /// Values at the quadrature points of `cell`.
    pub fn cell(&self, cell: usize) -> &[T] {
        &self.values[cell * self.num_quads..(cell + 1) * self.num_quads]
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Converts the values to another scalar type, e.g. to dual numbers with zero tangent.
    pub fn map<U: Real>(&self, f: impl Fn(T) -> U) -> QuadratureField<U> {
        QuadratureField {
            values: self.values.iter().map(|&v| f(v)).collect(),
            num_quads: self.num_quads,
        }
    }
}

use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use topofem_optimize::calculus::{approximate_gradient_fd, approximate_jacobian_fd};

#[test]
fn approximate_gradient_fd_of_quadratic() {
    // f(x) = x0^2 + 3 x0 x1, grad = (2 x0 + 3 x1, 3 x0)
    let f = |x: DVectorView<f64>| x[0] * x[0] + 3.0 * x[0] * x[1];
    let mut x = DVector::from_column_slice(&[1.5, -2.0]);
    let grad = approximate_gradient_fd(f, &mut x, 1e-6);

    assert_scalar_eq!(grad[0], -3.0, comp = abs, tol = 1e-8);
    assert_scalar_eq!(grad[1], 4.5, comp = abs, tol = 1e-8);
    assert_eq!(x, DVector::from_column_slice(&[1.5, -2.0]));
}

#[test]
fn approximate_jacobian_fd_of_affine_map() {
    let a = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, -1.0, 0.5, 4.0, 3.0]);
    let f = |x: DVectorView<f64>, mut y: DVectorViewMut<f64>| y.copy_from(&(&a * x));
    let mut x = DVector::from_column_slice(&[0.3, 0.7]);
    let j = approximate_jacobian_fd(3, f, &mut x, 1e-6);
    assert_matrix_eq!(j, a, comp = abs, tol = 1e-9);
}

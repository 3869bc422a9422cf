use nalgebra_sparse::{CooMatrix, CsrMatrix};


/// Tridiagonal SPD matrix with a varying diagonal, so that Jacobi scaling is non-trivial.
fn spd_tridiagonal(n: usize) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(n, n);
    for i in 0..n {
        coo.push(i, i, 2.0 + i as f64);
        if i + 1 < n {
            coo.push(i, i + 1, -1.0);
            coo.push(i + 1, i, -1.0);
        }
    }
    CsrMatrix::from(&coo)
}

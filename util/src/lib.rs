//! Test helpers shared by the crates in the workspace.

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Asserts that two scalars agree to within a tolerance relative to their magnitude.
#[macro_export]
macro_rules! assert_relative_eq_scaled {
    ($x:expr, $y:expr, reltol = $tol:expr) => {{
        let (x, y): (f64, f64) = ($x, $y);
        let scale = x.abs().max(y.abs()).max(1.0);
        if (x - y).abs() > $tol * scale {
            panic!(
                "assertion failed: {} ≈ {} (reltol {:e}, diff {:e})",
                x,
                y,
                $tol,
                (x - y).abs()
            );
        }
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

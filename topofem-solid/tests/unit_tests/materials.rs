use crate::unit_tests::{deformation_gradient_3d, lame_parameters};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{matrix, DVector, DVectorView, Matrix3};
use proptest::prelude::*;
use topofem_optimize::calculus::approximate_gradient_fd;
use topofem_solid::materials::{det3, LameParameters, LinearElasticMaterial, NeoHookeanMaterial, YoungPoisson};
use topofem_solid::{stress_from_energy_density, HyperelasticMaterial};

#[test]
fn lame_from_young_poisson() {
    let young_poisson = YoungPoisson {
        young: 1e3,
        poisson: 0.3,
    };
    let lame = LameParameters::from(young_poisson);

    assert_scalar_eq!(lame.mu, 384.6153846153846, comp = float);
    assert_scalar_eq!(lame.lambda, 576.9230769230769, comp = float);
    assert_scalar_eq!(lame.bulk_modulus(), 576.9230769230769 + 2.0 * 384.6153846153846 / 3.0, comp = abs, tol = 1e-10);
}

#[test]
fn determinant_matches_nalgebra() {
    let f = deformation_gradient_3d();
    assert_scalar_eq!(det3(&f), f.determinant(), comp = abs, tol = 1e-12);
}

#[test]
fn linear_elastic_strain_energy_3d() {
    let deformation_gradient = matrix![1.0, 2.0, 3.0;
                                       4.0, 5.0, 6.0;
                                       7.0, 8.0, 9.0];
    let psi = LinearElasticMaterial.compute_energy_density(&deformation_gradient, &lame_parameters());

    assert_scalar_eq!(psi, 136008.0, comp = float);
}

#[test]
#[allow(non_snake_case)]
fn linear_elastic_closed_form_stress_is_energy_gradient() {
    let F = deformation_gradient_3d();
    let lame = lame_parameters();
    let closed_form = LinearElasticMaterial.compute_stress_tensor(&F, &lame);
    let from_energy = stress_from_energy_density(&LinearElasticMaterial, &F, &lame);
    assert_matrix_eq!(closed_form, from_energy, comp = abs, tol = 1e-8);
}

#[test]
fn neo_hookean_is_stress_free_at_rest() {
    let lame = lame_parameters();
    let identity = Matrix3::identity();
    assert_scalar_eq!(
        NeoHookeanMaterial.compute_energy_density(&identity, &lame),
        0.0,
        comp = abs,
        tol = 1e-12
    );
    let stress = NeoHookeanMaterial.compute_stress_tensor(&identity, &lame);
    assert_matrix_eq!(stress, Matrix3::zeros(), comp = abs, tol = 1e-10);
}

#[test]
fn neo_hookean_stress_of_inverted_deformation_is_nan() {
    let reflection = Matrix3::from_diagonal(&nalgebra::vector![-1.0, 1.0, 1.0]);
    let stress = NeoHookeanMaterial.compute_stress_tensor(&reflection, &lame_parameters());
    assert!(stress.iter().any(|p| p.is_nan()));
}

fn deformation_gradient_strategy() -> impl Strategy<Value = Matrix3<f64>> {
    // Perturbations of the identity this small keep det(F) > 0
    proptest::array::uniform9(-0.3..0.3f64)
        .prop_map(|entries| Matrix3::identity() + Matrix3::from_column_slice(&entries))
}

proptest! {
    #[test]
    #[allow(non_snake_case)]
    fn neo_hookean_stress_matches_finite_difference_of_energy(
        F in deformation_gradient_strategy(),
        young in 1.0..1e3f64,
    ) {
        let lame = LameParameters::from(YoungPoisson { young, poisson: 0.3 });
        let stress = NeoHookeanMaterial.compute_stress_tensor(&F, &lame);

        let energy = |x: DVectorView<f64>| {
            let F = Matrix3::from_iterator(x.iter().copied());
            NeoHookeanMaterial.compute_energy_density(&F, &lame)
        };
        let mut x = DVector::from_column_slice(F.as_slice());
        let stress_fd = approximate_gradient_fd(energy, &mut x, 1e-6);

        let stress_fd = Matrix3::from_column_slice(stress_fd.as_slice());
        assert_matrix_eq!(stress, stress_fd, comp = abs, tol = 1e-5 * young.max(1.0));
    }
}

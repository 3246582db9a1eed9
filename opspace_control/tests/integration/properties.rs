//! Testable properties of the control law.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3};
use proptest::prelude::*;

use opspace_common::control::{ControlParameters, OscConfig};
use opspace_control::control::inertia::{InertiaEstimate, estimate_task_inertia};
use opspace_control::control::null_space::null_space_filter;
use opspace_control::control::velocity::approach_velocity;
use opspace_control::planar::PlanarArm;
use opspace_control::{JointState, OperationalSpaceController, RobotModel, TaskTarget};

use super::common::{ConstantModel, assert_close, bare_config, planar_three_link};

// ─── 1. Zero-error stillness ────────────────────────────────────────

#[test]
fn zero_error_gives_zero_torque() {
    let arm = planar_three_link();
    let joints = JointState::from_slices(&[0.3, 0.9, 0.5], &[0.0, 0.0, 0.0]);
    let pose = arm.pose(Default::default(), &joints.q, &Vector3::zeros());

    for vmax in [0.0, 0.5] {
        let mut ctrl = OperationalSpaceController::new(
            arm.clone(),
            &OscConfig {
                vmax,
                ..bare_config(100.0)
            },
        )
        .unwrap();
        let out = ctrl.generate(&joints, &TaskTarget::new(pose)).unwrap();
        assert!(out.torque.amax() < 1e-9, "vmax={vmax}: {}", out.torque);
    }
}

#[test]
fn zero_error_tracks_matching_target_velocity() {
    let model = ConstantModel::three_link(Vector3::new(0.1, 0.2, 0.3));
    let dq = DVector::from_vec(vec![0.2, -0.1, 0.4]);
    let dx = &model.jacobian * &dq;
    let joints = JointState::new(DVector::zeros(3), dq);
    let target = TaskTarget::new(model.pose).with_velocity(Vector3::new(dx[0], dx[1], dx[2]));

    let mut ctrl = OperationalSpaceController::new(
        model,
        &OscConfig {
            vmax: 1.0,
            ..bare_config(50.0)
        },
    )
    .unwrap();
    let out = ctrl.generate(&joints, &target).unwrap();
    assert!(out.torque.amax() < 1e-9);
}

// ─── 2. Velocity cap ────────────────────────────────────────────────

proptest! {
    #[test]
    fn approach_velocity_respects_cap(
        ex in -100.0f64..100.0,
        ey in -100.0f64..100.0,
        ez in -100.0f64..100.0,
        kp in 1.0f64..1000.0,
        vmax in 0.01f64..2.0,
    ) {
        let params = ControlParameters::resolve(&OscConfig { kp, vmax, ..Default::default() }).unwrap();
        let v = approach_velocity(&params, &Vector3::new(ex, ey, ez), vmax);
        for i in 0..3 {
            prop_assert!(v[i].is_finite());
            prop_assert!(v[i].abs() <= vmax * (1.0 + 1e-9), "axis {i}: |{}| > {vmax}", v[i]);
        }
    }
}

#[test]
fn velocity_cap_holds_through_controller() {
    let model = ConstantModel::three_link(Vector3::new(50.0, -20.0, 5.0));
    let mut ctrl = OperationalSpaceController::new(
        model,
        &OscConfig {
            vmax: 0.25,
            ..bare_config(400.0)
        },
    )
    .unwrap();
    let out = ctrl
        .generate(&JointState::zeros(3), &TaskTarget::new(Vector3::zeros()))
        .unwrap();
    let v = out.diagnostics.approach_velocity.unwrap();
    assert!(v.amax() <= 0.25 + 1e-12);
    assert!((v.amax() - 0.25).abs() < 1e-12);
}

// ─── 3. Null-space orthogonality ────────────────────────────────────

fn jacobian_strategy() -> impl Strategy<Value = Matrix3xX<f64>> {
    (3usize..8).prop_flat_map(|n| {
        proptest::collection::vec(-1.0f64..1.0, 3 * n)
            .prop_map(move |data| Matrix3xX::from_row_slice(&data))
    })
}

fn well_conditioned(j: &Matrix3xX<f64>) -> bool {
    let jjt: Matrix3<f64> = j * j.transpose();
    jjt.singular_values().min() > 0.05
}

proptest! {
    #[test]
    fn filter_annihilates_jacobian(j in jacobian_strategy()) {
        prop_assume!(well_conditioned(&j));
        let n = j.ncols();
        let m_inv = DMatrix::identity(n, n);
        let inertia = estimate_task_inertia(&DMatrix::identity(n, n), &j);
        prop_assert!(inertia.estimate.is_well_conditioned());

        let filter = null_space_filter(&m_inv, &j, inertia.mx());
        let product = &j * filter;
        prop_assert!(product.amax() < 1e-9, "J·filter = {}", product);
    }

    #[test]
    fn filtered_torque_causes_no_task_acceleration(
        j in jacobian_strategy(),
        seed in proptest::collection::vec(-1.0f64..1.0, 64),
    ) {
        prop_assume!(well_conditioned(&j));
        let n = j.ncols();
        // SPD mass matrix A·Aᵀ + I and an arbitrary bias torque.
        let a = DMatrix::from_fn(n, n, |r, c| seed[(r * n + c) % seed.len()]);
        let m = &a * a.transpose() + DMatrix::identity(n, n);
        let bias = DVector::from_fn(n, |i, _| seed[(i * 7 + 3) % seed.len()]);

        let inertia = estimate_task_inertia(&m, &j);
        let filter = null_space_filter(&inertia.mass_inverse, &j, inertia.mx());
        let accel = &j * (&inertia.mass_inverse * (filter * bias));
        prop_assert!(accel.amax() < 1e-8, "task acceleration {}", accel);
    }
}

// ─── 4. Singular fallback ───────────────────────────────────────────

#[test]
fn singular_mass_matrix_is_regularized() {
    // Massless first link, straight arm: M = m₂·J₂ᵀJ₂ has rank 1.
    let arm = PlanarArm::two_link(1.0, 1.0, 0.0, 1.0);
    let joints = JointState::zeros(2);
    let m = arm.mass_matrix(&joints.q);
    assert!(m.determinant().abs() < 1e-12);

    let mut ctrl = OperationalSpaceController::new(arm, &OscConfig { kp: 100.0, ..Default::default() }).unwrap();
    let out = ctrl
        .generate(&joints, &TaskTarget::new(Vector3::new(1.5, 0.5, 0.0)))
        .unwrap();

    let mx = match out.diagnostics.inertia {
        InertiaEstimate::Regularized(mx) => mx,
        InertiaEstimate::WellConditioned(_) => panic!("singular M must be regularized"),
    };
    assert!(mx.iter().all(|v| v.is_finite()));
    assert!((mx - mx.transpose()).amax() < 1e-12);
    assert!(out.torque.iter().all(|v| v.is_finite()));
    assert!(out.training_signal.iter().all(|v| v.is_finite()));
}

#[test]
fn rank_deficient_double_is_regularized() {
    let mut model = ConstantModel::three_link(Vector3::new(0.1, 0.0, 0.0));
    model.mass_matrix = DMatrix::from_row_slice(3, 3, &[1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    let mut ctrl = OperationalSpaceController::new(model, &bare_config(10.0)).unwrap();
    let out = ctrl
        .generate(&JointState::zeros(3), &TaskTarget::new(Vector3::zeros()))
        .unwrap();
    assert!(!out.diagnostics.inertia.is_well_conditioned());
    let mx = out.diagnostics.inertia.matrix();
    assert!((mx - mx.transpose()).amax() < 1e-12);
    assert!(out.torque.iter().all(|v| v.is_finite()));
}

// ─── 5. Integral monotonicity ───────────────────────────────────────

#[test]
fn integral_contribution_grows_monotonically() {
    let error = Vector3::new(0.02, -0.01, 0.005);
    let model = ConstantModel::three_link(error);
    let kp = 10.0;
    let mut ctrl = OperationalSpaceController::new(
        model,
        &OscConfig {
            ki: 0.5,
            ..bare_config(kp)
        },
    )
    .unwrap();
    let joints = JointState::zeros(3);
    let target = TaskTarget::new(Vector3::zeros());

    let mut last_acc = 0.0;
    let mut last_term = 0.0;
    for tick in 1..=50 {
        let out = ctrl.generate(&joints, &target).unwrap();
        let acc = ctrl.state().integral.integrated_error().norm();
        // u_task = -kp·e - ki·Σe
        let term = (out.diagnostics.u_task + kp * error).norm();
        assert!(acc >= last_acc, "tick {tick}: {acc} < {last_acc}");
        assert!(term > last_term, "tick {tick}: {term} <= {last_term}");
        assert!((acc - tick as f64 * error.norm()).abs() < 1e-12);
        last_acc = acc;
        last_term = term;
    }
}

// ─── 6. Gravity toggle isolation ────────────────────────────────────

#[test]
fn gravity_toggle_differs_by_gravity_torque() {
    let arm = planar_three_link();
    let joints = JointState::from_slices(&[0.2, 0.7, -0.3], &[0.1, -0.2, 0.3]);
    let target = TaskTarget::new(Vector3::new(0.5, 0.3, 0.0));
    let base = OscConfig {
        kp: 150.0,
        use_coriolis: true,
        ..Default::default()
    };

    let mut with = OperationalSpaceController::new(arm.clone(), &OscConfig { use_gravity: true, ..base.clone() }).unwrap();
    let mut without = OperationalSpaceController::new(arm.clone(), &OscConfig { use_gravity: false, ..base }).unwrap();

    let a = with.generate(&joints, &target).unwrap();
    let b = without.generate(&joints, &target).unwrap();
    let g = arm.gravity(&joints.q);
    assert_close(&(&b.torque - &a.torque), &g, 1e-10);
    assert_close(&a.training_signal, &b.training_signal, 1e-12);
}

// ─── 7. End-to-end scenario ─────────────────────────────────────────

#[test]
fn identity_doubles_give_direct_matrix_result() {
    let kp = 25.0;
    let e = Vector3::new(0.01, -0.02, 0.0);
    let target = Vector3::new(0.5, 0.5, 0.0);
    let model = ConstantModel::identity_two_link(target + e);
    let j = Matrix3xX::from_row_slice(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    let mut ctrl = OperationalSpaceController::new(model, &bare_config(kp)).unwrap();
    let out = ctrl
        .generate(&JointState::zeros(2), &TaskTarget::new(target))
        .unwrap();

    // J M⁻¹ Jᵀ = diag(1, 1, 0); its pseudo-inverse is itself.
    let mx = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0));
    let expected = j.transpose() * (mx * (-kp * e));
    assert_close(&out.torque, &expected, 1e-12);
    assert_close(&out.torque, &DVector::from_vec(vec![-0.25, 0.5]), 1e-12);
}

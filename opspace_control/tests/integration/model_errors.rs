//! Construction and per-tick rejection of bad models and inputs.

use nalgebra::{DMatrix, DVector, Vector3};
use opspace_common::control::OscConfig;
use opspace_common::error::OscError;
use opspace_common::frame::ReferenceFrame;
use opspace_control::planar::PlanarArm;
use opspace_control::{JointState, OperationalSpaceController, TaskTarget};

use super::common::{ConstantModel, bare_config};

#[test]
fn wrong_jacobian_shape_fails_construction() {
    let mut model = ConstantModel::identity_two_link(Vector3::zeros());
    model.jacobian = DMatrix::zeros(3, 3);
    let err = OperationalSpaceController::new(model, &bare_config(1.0)).unwrap_err();
    assert!(matches!(
        err,
        OscError::ModelShape {
            quantity: "jacobian",
            expected_cols: 2,
            cols: 3,
            ..
        }
    ));
}

#[test]
fn wrong_gravity_length_fails_only_when_used() {
    let mut model = ConstantModel::identity_two_link(Vector3::zeros());
    model.gravity = DVector::zeros(5);

    assert!(OperationalSpaceController::new(model.clone(), &bare_config(1.0)).is_ok());

    let err = OperationalSpaceController::new(
        model,
        &OscConfig {
            use_gravity: true,
            ..bare_config(1.0)
        },
    )
    .unwrap_err();
    assert!(matches!(err, OscError::ModelShape { quantity: "gravity", .. }));
}

#[test]
fn bad_rest_angles_fail_construction() {
    let mut model = ConstantModel::identity_two_link(Vector3::zeros());
    model.rest = vec![Some(0.0)];
    let err = OperationalSpaceController::new(model.clone(), &bare_config(1.0)).unwrap_err();
    assert!(matches!(err, OscError::DimensionMismatch { what: "rest angles", .. }));

    model.rest = vec![Some(f64::NAN), None];
    let err = OperationalSpaceController::new(model, &bare_config(1.0)).unwrap_err();
    assert!(matches!(err, OscError::NonFinite { .. }));
}

#[test]
fn invalid_gains_fail_construction() {
    let arm = PlanarArm::two_link(1.0, 1.0, 1.0, 1.0);
    for config in [
        OscConfig { kp: 0.0, ..Default::default() },
        OscConfig { kp: f64::NAN, ..Default::default() },
        OscConfig { ki: -1.0, ..Default::default() },
        OscConfig { vmax: -0.1, ..Default::default() },
        OscConfig { kv: Some(0.0), ..Default::default() },
    ] {
        let err = OperationalSpaceController::new(arm.clone(), &config).unwrap_err();
        assert!(matches!(err, OscError::InvalidGain { .. }), "{config:?} -> {err}");
    }
}

#[test]
fn per_tick_input_errors_leave_state_untouched() {
    let model = ConstantModel::three_link(Vector3::new(0.1, 0.0, 0.0));
    let mut ctrl = OperationalSpaceController::new(
        model,
        &OscConfig {
            ki: 1.0,
            ..bare_config(1.0)
        },
    )
    .unwrap();
    let target = TaskTarget::new(Vector3::zeros());
    ctrl.generate(&JointState::zeros(3), &target).unwrap();
    let before = ctrl.state().clone();

    let short = JointState::zeros(2);
    assert!(matches!(
        ctrl.generate(&short, &target),
        Err(OscError::DimensionMismatch { expected: 3, actual: 2, .. })
    ));

    let nan_q = JointState::from_slices(&[0.0, f64::NAN, 0.0], &[0.0; 3]);
    assert!(matches!(ctrl.generate(&nan_q, &target), Err(OscError::NonFinite { .. })));

    let nan_target = TaskTarget::new(Vector3::new(f64::INFINITY, 0.0, 0.0));
    assert!(matches!(
        ctrl.generate(&JointState::zeros(3), &nan_target),
        Err(OscError::NonFinite { .. })
    ));

    assert_eq!(*ctrl.state(), before);
}

#[test]
fn unknown_frame_is_rejected() {
    let arm = PlanarArm::two_link(1.0, 1.0, 1.0, 1.0);
    let mut ctrl = OperationalSpaceController::new(arm, &OscConfig::default()).unwrap();
    let joints = JointState::zeros(2);

    let inside = TaskTarget::new(Vector3::new(1.0, 0.0, 0.0)).in_frame(ReferenceFrame::Link(0), Vector3::zeros());
    assert!(ctrl.generate(&joints, &inside).is_ok());

    let outside = TaskTarget::new(Vector3::zeros()).in_frame(ReferenceFrame::Joint(7), Vector3::zeros());
    let err = ctrl.generate(&joints, &outside).unwrap_err();
    assert_eq!(
        err,
        OscError::UnknownFrame {
            frame: "joint7".into()
        }
    );
}

#[test]
fn non_finite_model_output_is_an_error() {
    let mut model = ConstantModel::identity_two_link(Vector3::zeros());
    model.coriolis = DVector::from_vec(vec![f64::NAN, 0.0]);
    let config = OscConfig {
        use_coriolis: true,
        ..bare_config(1.0)
    };
    let err = OperationalSpaceController::new(model, &config).unwrap_err();
    assert!(matches!(err, OscError::NonFinite { .. }));
}

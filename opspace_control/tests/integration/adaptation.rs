//! Adaptation hook in the closed loop.

use nalgebra::{DVector, Vector3};
use opspace_common::control::OscConfig;
use opspace_common::error::OscError;
use opspace_control::adaptation::{AdaptationContext, DynamicsAdaptation, from_fn};
use opspace_control::planar::PlanarArm;
use opspace_control::sim::{RunSettings, Simulation};
use opspace_control::{JointState, RobotModel, TaskTarget};

use super::common::planar_three_link;

/// Known-disturbance adapter that also records what it was shown.
struct Cancelling {
    disturbance: DVector<f64>,
    calls: usize,
    last_training: Option<DVector<f64>>,
}

impl DynamicsAdaptation for Cancelling {
    fn correct(&mut self, ctx: &AdaptationContext<'_>) -> DVector<f64> {
        self.calls += 1;
        self.last_training = Some(ctx.training_signal.clone());
        -&self.disturbance
    }
}

fn disturbed_sim(ticks: u64) -> Simulation<PlanarArm> {
    let arm = planar_three_link();
    let q0 = DVector::from_vec(vec![0.3, 0.9, 0.5]);
    let target = arm.pose(Default::default(), &q0, &Vector3::zeros());
    let settings = RunSettings {
        ticks,
        dt: 0.001,
        target: TaskTarget::new(target),
        disturbance: Some(DVector::from_vec(vec![2.0, -1.0, 0.5])),
        log_interval: 0,
    };
    let config = OscConfig {
        kp: 100.0,
        use_coriolis: true,
        use_jacobian_derivative: true,
        ..Default::default()
    };
    Simulation::new(arm, &config, settings, JointState::new(q0, DVector::zeros(3))).unwrap()
}

#[test]
fn cancelling_adapter_restores_tracking() {
    let plain = disturbed_sim(3000).run(None).unwrap();

    let mut adapter = Cancelling {
        disturbance: DVector::from_vec(vec![2.0, -1.0, 0.5]),
        calls: 0,
        last_training: None,
    };
    let adapted = disturbed_sim(3000).run(Some(&mut adapter)).unwrap();

    assert!(plain.final_error > 1e-2, "plain error {}", plain.final_error);
    assert!(adapted.final_error < 1e-4, "adapted error {}", adapted.final_error);
    assert_eq!(adapter.calls, 3000);
    assert_eq!(adapter.last_training.map(|t| t.len()), Some(3));
}

#[test]
fn closure_adapter_sees_training_signal() {
    let mut sim = disturbed_sim(1);
    let mut seen = Vec::new();
    let mut adapter = from_fn(|ctx: &AdaptationContext<'_>| {
        seen.push(ctx.training_signal.clone());
        DVector::zeros(ctx.joints.q.len())
    });

    let out = sim.step(Some(&mut adapter)).unwrap();
    drop(adapter);
    assert_eq!(seen.len(), 1);
    // Zero correction: the command is untouched and the signal matches.
    assert_eq!(seen[0], out.training_signal);
}

#[test]
fn bad_correction_aborts_tick() {
    let mut sim = disturbed_sim(10);
    let q_before = sim.joints().q.clone();

    let mut wrong_len = from_fn(|_: &AdaptationContext<'_>| DVector::zeros(2));
    let err = sim.step(Some(&mut wrong_len)).unwrap_err();
    assert!(matches!(err, OscError::DimensionMismatch { expected: 3, actual: 2, .. }));

    let mut nan = from_fn(|_: &AdaptationContext<'_>| DVector::from_element(3, f64::NAN));
    let err = sim.step(Some(&mut nan)).unwrap_err();
    assert!(matches!(err, OscError::NonFinite { .. }));

    // The plant never stepped.
    assert_eq!(sim.joints().q, q_before);
    assert_eq!(sim.stats().tick_count, 0);
}

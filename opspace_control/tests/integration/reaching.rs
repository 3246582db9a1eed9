//! Closed-loop reaching on the planar arm.

use std::path::Path;

use nalgebra::{DVector, Vector3};
use opspace_common::control::OscConfig;
use opspace_control::config::SimConfig;
use opspace_control::control::null_space::shortest_angle;
use opspace_control::planar::PlanarArm;
use opspace_control::sim::{RunSettings, Simulation};
use opspace_control::{JointState, RobotModel, TaskTarget};

use super::common::planar_three_link;

fn compensated(kp: f64) -> OscConfig {
    OscConfig {
        kp,
        vmax: 0.5,
        use_coriolis: true,
        use_jacobian_derivative: true,
        ..Default::default()
    }
}

fn settings(ticks: u64, target: Vector3<f64>, disturbance: Option<DVector<f64>>) -> RunSettings {
    RunSettings {
        ticks,
        dt: 0.001,
        target: TaskTarget::new(target),
        disturbance,
        log_interval: 0,
    }
}

fn rest_distance(q: &[f64], rest: &[f64]) -> f64 {
    q.iter()
        .zip(rest)
        .map(|(q, r)| shortest_angle(*r, *q).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[test]
fn three_link_reaches_target() {
    let initial = JointState::from_slices(&[0.3, 0.9, 0.5], &[0.0; 3]);
    let target = Vector3::new(0.45, 0.35, 0.0);
    let mut sim = Simulation::new(
        planar_three_link(),
        &compensated(100.0),
        settings(3000, target, None),
        initial,
    )
    .unwrap();

    let first = sim.step(None).unwrap();
    let start_error = first.diagnostics.error.norm();
    assert!(start_error > 0.2);

    let report = sim.run(None).unwrap();
    assert_eq!(report.ticks, 3001);
    assert!(report.final_error < 1e-3, "final error {}", report.final_error);
    assert!(report.final_pose[2].abs() < 1e-12);

    // Joints may still drift toward the rest pose; the end effector may not.
    let last = sim.step(None).unwrap();
    assert!(last.diagnostics.task_velocity.norm() < 1e-3);
}

#[test]
fn approach_speed_stays_near_cap() {
    let initial = JointState::from_slices(&[0.3, 0.9, 0.5], &[0.0; 3]);
    let mut sim = Simulation::new(
        planar_three_link(),
        &compensated(100.0),
        settings(1500, Vector3::new(0.45, 0.35, 0.0), None),
        initial,
    )
    .unwrap();

    for _ in 0..1500 {
        let out = sim.step(None).unwrap();
        let v_app = out.diagnostics.approach_velocity.unwrap();
        assert!(v_app.amax() <= 0.5 + 1e-12);
        // The force tracks the capped velocity, so the arm never runs far past it.
        assert!(out.diagnostics.task_velocity.amax() < 0.75);
    }
}

#[test]
fn null_space_keeps_joints_near_rest() {
    let rest = [0.0, 1.2, 0.6];
    let target = Vector3::new(0.45, 0.35, 0.0);
    let run = |null_control: bool| {
        let mut sim = Simulation::new(
            planar_three_link(),
            &OscConfig {
                null_control,
                ..compensated(100.0)
            },
            settings(3000, target, None),
            JointState::from_slices(&[0.3, 0.9, 0.5], &[0.0; 3]),
        )
        .unwrap();
        sim.run(None).unwrap()
    };

    let with = run(true);
    let without = run(false);
    assert!(with.final_error < 1e-3);
    assert!(without.final_error < 1e-3);
    assert!(rest_distance(&with.final_q, &rest) < rest_distance(&without.final_q, &rest));
}

#[test]
fn integral_rejects_constant_disturbance() {
    let arm = planar_three_link();
    let q0 = DVector::from_vec(vec![0.3, 0.9, 0.5]);
    let target = arm.pose(Default::default(), &q0, &Vector3::zeros());
    let disturbance = DVector::from_vec(vec![2.0, -1.0, 0.5]);

    let run = |ki: f64| {
        let mut sim = Simulation::new(
            arm.clone(),
            &OscConfig {
                ki,
                ..compensated(100.0)
            },
            settings(5000, target, Some(disturbance.clone())),
            JointState::new(q0.clone(), DVector::zeros(3)),
        )
        .unwrap();
        sim.run(None).unwrap()
    };

    let plain = run(0.0);
    let integral = run(0.3);
    assert!(plain.final_error > 1e-2, "disturbance too weak: {}", plain.final_error);
    assert!(integral.final_error < 1e-3, "integral error {}", integral.final_error);
    assert!(integral.final_error < 0.1 * plain.final_error);
}

#[test]
fn unlimited_law_settles_on_two_link() {
    let arm = PlanarArm::two_link(1.0, 1.0, 1.0, 1.0);
    let config = OscConfig {
        vmax: 0.0,
        ..compensated(100.0)
    };
    let target = Vector3::new(1.2, 0.8, 0.0);
    let mut sim = Simulation::new(
        arm,
        &config,
        settings(3000, target, None),
        JointState::from_slices(&[0.3, 0.6], &[0.0, 0.0]),
    )
    .unwrap();

    let start = sim.report().final_error;
    let report = sim.run(None).unwrap();
    assert!(report.final_error.is_finite());
    assert!(report.final_error < 0.1 * start, "{} vs {start}", report.final_error);
}

#[test]
fn shipped_config_converges() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/sim.toml");
    let config = SimConfig::load_file(&path).unwrap();
    let n = config.arm.link_lengths.len();

    let arm = PlanarArm::new(&config.arm).unwrap();
    let mut sim = Simulation::new(
        arm,
        &config.controller,
        config.run.settings(),
        config.run.initial_state(n),
    )
    .unwrap();
    assert_eq!(sim.controller().null_space_joints(), vec![false, true, true]);

    let report = sim.run(None).unwrap();
    assert_eq!(report.ticks, config.run.ticks);
    assert!(report.final_error < 1e-3, "final error {}", report.final_error);
    assert_eq!(report.stats.regularized_ticks, report.ticks);
}

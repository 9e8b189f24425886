use std::cell::Cell;

use approx::assert_relative_eq;
use mpc_orca::{
    double_integrator, Agent, CommandStatus, HalfPlane, HalfPlaneOracle, HorizonConfig, MpcOrca,
    OperatingState, SolverSettings, StateVector, StepError,
};
use prelude::*;

const TOL: float = 1e-3;

fn controller(position: Vector2, n_colliders: usize) -> MpcOrca {
    MpcOrca::with_orca(
        position,
        0.4,
        n_colliders,
        HorizonConfig::default(),
        &SolverSettings::default(),
    )
    .unwrap()
}

fn hold(position: Vector2, N: usize) -> Vec<StateVector> {
    vec![StateVector::stationary(position); N + 1]
}

/// `position + k Ts velocity` with the matching velocity at every node.
fn constant_velocity(state: &StateVector, N: usize, Ts: float) -> Vec<StateVector> {
    (0..=N)
        .map(|k| StateVector::new(state.position + state.velocity * (k as float * Ts), state.velocity))
        .collect()
}

#[test]
fn solved_velocities_respect_bounds() {
    let config = HorizonConfig::default();
    let mut mpc = controller(Vector2::zeros(), 0);
    let agent = StateVector::stationary(Vector2::zeros());

    let command = mpc.step(&agent, &[], &hold(Vector2::new(20.0, -20.0), config.N)).unwrap();
    assert_eq!(command.status, CommandStatus::Nominal);
    assert_eq!(mpc.state(), OperatingState::Nominal);

    for state in &mpc.plan().unwrap().states {
        for &v in state.velocity.iter() {
            assert!(v >= config.v_min - TOL && v <= config.v_max + TOL, "{}", v);
        }
    }
    for &v in command.velocity.iter() {
        assert!(v >= config.v_min - TOL && v <= config.v_max + TOL, "{}", v);
    }
}

#[test]
fn first_step_follows_dynamics() {
    let config = HorizonConfig::default();
    let mut mpc = controller(Vector2::new(1.0, 1.0), 0);
    let agent = StateVector::new(Vector2::new(1.0, 1.0), Vector2::new(0.3, -0.2));

    let command = mpc.step(&agent, &[], &hold(Vector2::new(-1.0, 2.0), config.N)).unwrap();
    assert!(command.is_nominal());

    let (A, B) = double_integrator(config.Ts);
    let plan = mpc.plan().unwrap();
    let x0 = plan.states[0].to_vector();
    assert_relative_eq!(x0, agent.to_vector(), epsilon = TOL);

    let x1 = A * x0 + B * plan.controls[0];
    assert_relative_eq!(plan.states[1].to_vector(), x1, epsilon = TOL);
    assert_relative_eq!(command.velocity, Vector2::new(x1[2], x1[3]), epsilon = TOL);
}

#[test]
fn head_on_collider_half_planes_hold() {
    let config = HorizonConfig::default();
    let mut mpc = controller(Vector2::zeros(), 1);
    let agent = StateVector::new(Vector2::zeros(), Vector2::new(1.0, 0.0));
    let collider = Agent::new(Vector2::new(5.0, 0.0), Vector2::new(-1.0, 0.0), 0.4);

    let trajectory = constant_velocity(&agent, config.N, config.Ts);
    let command = mpc.step(&agent, &[collider], &trajectory).unwrap();
    assert!(command.is_nominal(), "{:?}", command.status);

    let plan = mpc.plan().unwrap();
    for k in 0..config.N {
        let plane = mpc.half_plane(k, 0).unwrap();
        let v = plan.states[k + 1].velocity;
        assert!(plane.contains(&v, TOL), "step {}: {:?} violates {:?}", k, v, plane);
    }
    // Continuing straight would violate the first half-plane
    let first = mpc.half_plane(0, 0).unwrap();
    assert!(!first.contains(&agent.velocity, TOL));
    assert!(first.contains(&command.velocity, TOL));
}

#[test]
fn nearby_colliders_limit_approach_speed() {
    let config = HorizonConfig::default();
    let mut mpc = controller(Vector2::zeros(), 3);
    let agent = StateVector::stationary(Vector2::zeros());
    let colliders = [
        Agent::new(Vector2::new(2.0, 0.0), Vector2::zeros(), 0.4),
        Agent::new(Vector2::new(0.0, 2.0), Vector2::zeros(), 0.4),
        Agent::new(Vector2::new(-2.0, -2.0), Vector2::zeros(), 0.4),
    ];

    let command = mpc
        .step(&agent, &colliders, &hold(Vector2::new(1.0, 1.0), config.N))
        .unwrap();
    assert!(command.is_nominal(), "{:?}", command.status);

    let plan = mpc.plan().unwrap();
    assert_eq!(mpc.half_planes().len(), 3 * config.N);
    for i in 0..colliders.len() {
        for k in 0..config.N {
            let plane = mpc.half_plane(k, i).unwrap();
            assert!(plane.contains(&plan.states[k + 1].velocity, TOL), "({}, {})", k, i);
        }
    }
    // Stationary colliders 2 m away cap the approach at 0.06 m/s
    assert!(command.velocity.x <= 0.06 + TOL);
    assert!(command.velocity.y <= 0.06 + TOL);
}

/// Demands `vx <= -5` while enabled, which the velocity box cannot satisfy, and `vx <= 5`
/// otherwise.
struct Overconstrained {
    enabled: Cell<bool>,
}

impl HalfPlaneOracle for Overconstrained {
    fn half_plane(&self, _agent: &Agent, _collider: &Agent, _tau: float, _dt: float) -> HalfPlane {
        let bound = if self.enabled.get() { -5.0 } else { 5.0 };
        HalfPlane {
            reference_velocity: Vector2::new(bound, 0.0),
            normal: Vector2::new(1.0, 0.0),
        }
    }
}

#[test]
fn infeasible_cycle_falls_back_and_recovers() {
    let config = HorizonConfig::default();
    let oracle = Overconstrained {
        enabled: Cell::new(true),
    };
    let mut mpc = MpcOrca::new(
        Vector2::zeros(),
        0.4,
        1,
        config.clone(),
        &SolverSettings::default(),
        oracle,
    )
    .unwrap();
    let agent = StateVector::new(Vector2::zeros(), Vector2::new(0.4, -0.2));
    let collider = Agent::new(Vector2::new(5.0, 5.0), Vector2::zeros(), 0.4);
    let trajectory = hold(Vector2::new(1.0, 0.0), config.N);

    let command = mpc.step(&agent, &[collider], &trajectory).unwrap();
    assert!(matches!(command.status, CommandStatus::Degraded { .. }));
    assert_eq!(command.velocity, agent.velocity);
    assert_eq!(command.acceleration, Vector2::zeros());
    assert_eq!(mpc.state(), OperatingState::Degraded);
    assert!(mpc.plan().is_none());

    // The state only reflects the current cycle
    mpc.oracle().enabled.set(false);
    let command = mpc.step(&agent, &[collider], &trajectory).unwrap();
    assert_eq!(command.status, CommandStatus::Nominal);
    assert_eq!(mpc.state(), OperatingState::Nominal);
}

/// Returns a NaN normal while enabled and a loose half-plane otherwise.
struct Degenerate {
    enabled: Cell<bool>,
}

impl HalfPlaneOracle for Degenerate {
    fn half_plane(&self, _agent: &Agent, _collider: &Agent, _tau: float, _dt: float) -> HalfPlane {
        let x = if self.enabled.get() { float::NAN } else { 1.0 };
        HalfPlane {
            reference_velocity: Vector2::new(5.0, 0.0),
            normal: Vector2::new(x, 0.0),
        }
    }
}

#[test]
fn non_finite_half_plane_degrades_one_cycle() {
    let config = HorizonConfig::default();
    let oracle = Degenerate {
        enabled: Cell::new(true),
    };
    let mut mpc = MpcOrca::new(
        Vector2::zeros(),
        0.4,
        1,
        config.clone(),
        &SolverSettings::default(),
        oracle,
    )
    .unwrap();
    let agent = StateVector::new(Vector2::zeros(), Vector2::new(0.2, 0.0));
    let collider = Agent::new(Vector2::new(5.0, 5.0), Vector2::zeros(), 0.4);
    let trajectory = hold(Vector2::new(1.0, 0.0), config.N);

    let command = mpc.step(&agent, &[collider], &trajectory).unwrap();
    assert!(matches!(command.status, CommandStatus::Degraded { .. }));
    assert_eq!(command.velocity, agent.velocity);
    assert_eq!(mpc.state(), OperatingState::Degraded);

    mpc.oracle().enabled.set(false);
    let command = mpc.step(&agent, &[collider], &trajectory).unwrap();
    assert_eq!(command.status, CommandStatus::Nominal);
    assert!(command.velocity.iter().all(|v| v.is_finite()));
}

#[test]
fn bad_setpoint_does_not_poison_later_cycles() {
    let config = HorizonConfig::default();
    let mut mpc = controller(Vector2::zeros(), 0);
    let agent = StateVector::stationary(Vector2::zeros());
    let mut trajectory = hold(Vector2::new(1.0, 1.0), config.N);
    trajectory[config.N].position.x = float::INFINITY;

    assert_eq!(
        mpc.step(&agent, &[], &trajectory),
        Err(StepError::NonFinite {
            input: "trajectory",
            index: config.N
        })
    );
    let command = mpc.step(&agent, &[], &hold(Vector2::new(1.0, 1.0), config.N)).unwrap();
    assert!(command.is_nominal());
    assert!(command.acceleration.x > 0.0);
}

#[test]
fn identical_inputs_give_identical_commands() {
    let config = HorizonConfig::default();
    let agent = StateVector::new(Vector2::zeros(), Vector2::new(1.0, 0.0));
    let collider = Agent::new(Vector2::new(5.0, 0.0), Vector2::new(-1.0, 0.0), 0.4);
    let trajectory = constant_velocity(&agent, config.N, config.Ts);

    let mut first = controller(Vector2::zeros(), 1);
    let mut second = controller(Vector2::zeros(), 1);
    let a = first.step(&agent, &[collider], &trajectory).unwrap();
    let b = second.step(&agent, &[collider], &trajectory).unwrap();

    assert_eq!(a, b);
    assert_eq!(first.half_planes(), second.half_planes());
}

#[test]
fn reference_at_current_state_holds_still() {
    let config = HorizonConfig::default();
    let position = Vector2::new(1.0, 2.0);
    let mut mpc = controller(position, 0);
    let agent = StateVector::stationary(position);

    let command = mpc.step(&agent, &[], &hold(position, config.N)).unwrap();
    assert!(command.is_nominal());
    assert_relative_eq!(command.velocity, Vector2::zeros(), epsilon = TOL);
    assert_relative_eq!(command.acceleration, Vector2::zeros(), epsilon = TOL);
}

#[test]
fn reference_moving_with_agent_keeps_velocity() {
    let config = HorizonConfig::default();
    let mut mpc = controller(Vector2::zeros(), 0);
    let agent = StateVector::new(Vector2::zeros(), Vector2::new(0.5, -0.25));

    let trajectory = constant_velocity(&agent, config.N, config.Ts);
    let command = mpc.step(&agent, &[], &trajectory).unwrap();
    assert!(command.is_nominal());
    assert_relative_eq!(command.velocity, agent.velocity, epsilon = TOL);
    assert_relative_eq!(command.acceleration, Vector2::zeros(), epsilon = TOL);
}

#[test]
fn closed_loop_converges_to_goal() {
    let config = HorizonConfig::default();
    let goal = Vector2::new(2.0, 1.0);
    let mut mpc = controller(Vector2::zeros(), 0);
    let mut state = StateVector::stationary(Vector2::zeros());
    let (A, B) = double_integrator(config.Ts);

    for _ in 0..200 {
        let command = mpc.step(&state, &[], &hold(goal, config.N)).unwrap();
        assert!(command.is_nominal());
        let next = A * state.to_vector() + B * command.acceleration;
        state = StateVector::from_slice(next.as_slice());
    }

    assert!((state.position - goal).norm() < 0.05, "{:?}", state);
    assert!(state.velocity.norm() < 0.05, "{:?}", state);
}

#[test]
fn mismatched_inputs_are_rejected_before_update() {
    let config = HorizonConfig::default();
    let mut mpc = controller(Vector2::zeros(), 1);
    let agent = StateVector::stationary(Vector2::zeros());
    let collider = Agent::new(Vector2::new(5.0, 0.0), Vector2::zeros(), 0.4);

    assert_eq!(
        mpc.step(&agent, &[collider], &hold(Vector2::zeros(), config.N - 1)),
        Err(StepError::TrajectoryLength {
            expected: config.N + 1,
            got: config.N
        })
    );
    assert_eq!(
        mpc.step(&agent, &[], &hold(Vector2::zeros(), config.N)),
        Err(StepError::ColliderCount {
            expected: 1,
            got: 0
        })
    );
    assert!(mpc.half_planes().is_empty());
    assert!(mpc.plan().is_none());
    assert_eq!(mpc.state(), OperatingState::Nominal);
}

//! Per-cycle rewrite of the time-varying parts of the QP.

use prelude::*;

use crate::predictor::predict_agents;
use crate::qp::Qp;
use crate::{Agent, HalfPlane, HalfPlaneOracle, HorizonConfig, StateVector};

/// Writes one half-plane per (step, collider) into the collision rows of `qp` and pins the
/// initial state to `agent`.
///
/// The agent is predicted at constant velocity and the oracle is evaluated around its current
/// velocity at every step. `half_planes` is refilled in slot order.
pub(crate) fn update<O: HalfPlaneOracle + ?Sized>(
    oracle: &O,
    agent: &Agent,
    colliders: &[Agent],
    config: &HorizonConfig,
    qp: &mut Qp,
    half_planes: &mut Vec<HalfPlane>,
) {
    let _guard = flame::start_guard("update constraints");
    assert_eq!(colliders.len(), qp.layout.n_colliders);

    half_planes.clear();
    for (i, collider) in colliders.iter().enumerate() {
        let agent_k = predict_agents(agent, config.N, config.Ts);
        let collider_k = predict_agents(collider, config.N, config.Ts);
        for (k, (a, c)) in agent_k.zip(collider_k).enumerate() {
            let plane = oracle.half_plane(&a, &c, config.tau, config.Ts);
            let slot = qp.index_map.slot(k, i);
            slot.set_normal(&mut qp.A, &plane.normal);
            qp.l[slot.row] = NEG_INFINITY;
            qp.u[slot.row] = plane.bound();
            half_planes.push(plane);
        }
    }

    qp.set_initial_state(&StateVector::from(agent));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qp;
    use crate::Orca;
    use std::cell::RefCell;

    /// Records every query and answers with a plane derived from the step.
    #[derive(Default)]
    struct Recorder {
        queries: RefCell<Vec<(Agent, Agent)>>,
    }

    impl HalfPlaneOracle for Recorder {
        fn half_plane(&self, agent: &Agent, collider: &Agent, _tau: float, _dt: float) -> HalfPlane {
            let mut queries = self.queries.borrow_mut();
            let n = queries.len() as float;
            queries.push((*agent, *collider));
            HalfPlane {
                reference_velocity: Vector2::new(n, 0.0),
                normal: Vector2::new(1.0, 0.0),
            }
        }
    }

    fn agent() -> Agent {
        Agent::new(Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), 0.4)
    }

    #[test]
    fn writes_every_slot_and_bound() {
        let config = HorizonConfig {
            N: 3,
            ..HorizonConfig::default()
        };
        let colliders = [
            Agent::new(Vector2::new(5.0, 0.0), Vector2::new(-1.0, 0.0), 0.4),
            Agent::new(Vector2::new(0.0, 5.0), Vector2::new(0.0, -1.0), 0.4),
        ];
        let mut qp = qp::build(&config, 2, &StateVector::stationary(Vector2::zeros()));
        let before = qp.A.to_dense();
        let recorder = Recorder::default();
        let mut planes = Vec::new();

        update(&recorder, &agent(), &colliders, &config, &mut qp, &mut planes);

        assert_eq!(planes.len(), 6);
        let queries = recorder.queries.borrow();
        for i in 0..2 {
            for k in 0..3 {
                let n = i * 3 + k;
                let (a, c) = queries[n];
                assert!((a.position.x - 0.1 * k as float).abs() < 1e-12);
                assert_eq!(a.velocity, agent().velocity);
                assert_eq!(c.velocity, colliders[i].velocity);

                let slot = qp.index_map.slot(k, i);
                assert_eq!(qp.l[slot.row], NEG_INFINITY);
                assert_eq!(qp.u[slot.row], n as float);
                assert_eq!(qp.A.data()[slot.entries[0]], 1.0);
                assert_eq!(qp.A.data()[slot.entries[1]], 0.0);
            }
        }

        // Only the collision rows changed
        let after = qp.A.to_dense();
        let first_collision = qp.layout.collision_row(0, 0);
        assert_eq!(
            before.rows(0, first_collision),
            after.rows(0, first_collision)
        );
        assert_eq!(&qp.l[..4], &[-0.0, -0.0, -1.0, -0.0]);
        assert_eq!(&qp.u[..4], &qp.l[..4]);
    }

    #[test]
    fn repeated_updates_overwrite_previous_cycle() {
        let config = HorizonConfig {
            N: 2,
            ..HorizonConfig::default()
        };
        let collider = [Agent::new(Vector2::new(5.0, 0.0), Vector2::new(-1.0, 0.0), 0.4)];
        let mut qp = qp::build(&config, 1, &StateVector::stationary(Vector2::zeros()));
        let mut planes = Vec::new();

        update(&Orca, &agent(), &collider, &config, &mut qp, &mut planes);
        let first = qp.A.data().to_vec();
        update(&Orca, &agent(), &collider, &config, &mut qp, &mut planes);

        assert_eq!(planes.len(), 2);
        assert_eq!(qp.A.data(), &first[..]);
        for (k, plane) in planes.iter().enumerate() {
            let slot = qp.index_map.slot(k, 0);
            assert_eq!(qp.A.get(slot.row, qp.layout.state(k + 1) + 2), Some(plane.normal.x));
            assert_eq!(qp.A.get(slot.row, qp.layout.state(k + 1) + 3), Some(plane.normal.y));
        }
    }

    #[test]
    fn no_colliders_only_pins_initial_state() {
        let config = HorizonConfig::default();
        let mut qp = qp::build(&config, 0, &StateVector::stationary(Vector2::zeros()));
        let mut planes = vec![HalfPlane {
            reference_velocity: Vector2::zeros(),
            normal: Vector2::x(),
        }];
        let moving = Agent::new(Vector2::new(2.0, 3.0), Vector2::new(0.5, 0.0), 0.4);

        update(&Orca, &moving, &[], &config, &mut qp, &mut planes);

        assert!(planes.is_empty());
        assert_eq!(&qp.l[..4], &[-2.0, -3.0, -0.5, -0.0]);
        assert_eq!(&qp.u[..4], &[-2.0, -3.0, -0.5, -0.0]);
    }
}

use log::{debug, warn};
use prelude::*;

use crate::constraints;
use crate::qp::{self, Qp};
use crate::solver::{IncrementalSolver, SolverSettings};
use crate::{
    Agent, ControllerError, HalfPlane, HalfPlaneOracle, HorizonConfig, InvalidConfig, Orca,
    StateVector, StepError,
};

/// Whether the last cycle produced an optimal command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatingState {
    Nominal,
    Degraded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Nominal,
    /// The QP was not solved and the command holds the current velocity.
    Degraded { solver_status: &'static str },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Command {
    /// Velocity of horizon node 1.
    pub velocity: Vector2,
    /// First control of the horizon.
    pub acceleration: Vector2,
    pub status: CommandStatus,
}

impl Command {
    pub fn is_nominal(&self) -> bool {
        self.status == CommandStatus::Nominal
    }
}

/// The optimal trajectory found in a nominal cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    /// Nodes `0..=N`.
    pub states: Vec<StateVector>,
    /// Steps `0..N`.
    pub controls: Vec<Vector2>,
}

impl Plan {
    fn from_solution(layout: &qp::Layout, x: &[float]) -> Plan {
        let states = (0..=layout.N)
            .map(|k| StateVector::from_slice(&x[layout.state(k)..layout.state(k) + 4]))
            .collect();
        let controls = (0..layout.N)
            .map(|k| Vector2::new(x[layout.control(k)], x[layout.control(k) + 1]))
            .collect();
        Plan { states, controls }
    }
}

/// Tracking MPC with ORCA half-plane constraints for a single agent.
pub struct MpcOrca<O = Orca> {
    config: HorizonConfig,
    radius: float,
    oracle: O,
    qp: Qp,
    solver: IncrementalSolver,
    half_planes: Vec<HalfPlane>,
    state: OperatingState,
    plan: Option<Plan>,
}

impl MpcOrca<Orca> {
    pub fn with_orca(
        initial_position: Vector2,
        radius: float,
        n_colliders: usize,
        config: HorizonConfig,
        settings: &SolverSettings,
    ) -> Result<MpcOrca<Orca>, ControllerError> {
        MpcOrca::new(initial_position, radius, n_colliders, config, settings, Orca)
    }
}

impl<O: HalfPlaneOracle> MpcOrca<O> {
    /// Builds the QP for `n_colliders` colliders and sets up the solver. The controller
    /// starts at rest at `initial_position`.
    pub fn new(
        initial_position: Vector2,
        radius: float,
        n_colliders: usize,
        config: HorizonConfig,
        settings: &SolverSettings,
        oracle: O,
    ) -> Result<MpcOrca<O>, ControllerError> {
        config.validate()?;
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(InvalidConfig::Radius(radius).into());
        }

        let qp = qp::build(&config, n_colliders, &StateVector::stationary(initial_position));
        let solver = IncrementalSolver::new(&qp, settings)?;
        debug!(
            "mpc_orca: {} variables, {} constraints, {} nonzeros in A",
            qp.layout.n_vars(),
            qp.layout.n_constraints(),
            qp.A.nnz()
        );

        Ok(MpcOrca {
            half_planes: Vec::with_capacity(config.N * n_colliders),
            config,
            radius,
            oracle,
            qp,
            solver,
            state: OperatingState::Nominal,
            plan: None,
        })
    }

    /// Runs one control cycle.
    ///
    /// `colliders` must hold one snapshot per collider the controller was built for and
    /// `trajectory` one desired state per node, all of them finite. When the QP is not solved
    /// the command keeps the current velocity with zero acceleration.
    pub fn step(
        &mut self,
        agent: &StateVector,
        colliders: &[Agent],
        trajectory: &[StateVector],
    ) -> Result<Command, StepError> {
        let _guard = flame::start_guard("mpc_orca step");

        if trajectory.len() != self.config.N + 1 {
            return Err(StepError::TrajectoryLength {
                expected: self.config.N + 1,
                got: trajectory.len(),
            });
        }
        if colliders.len() != self.qp.layout.n_colliders {
            return Err(StepError::ColliderCount {
                expected: self.qp.layout.n_colliders,
                got: colliders.len(),
            });
        }
        if !is_finite_state(agent) {
            return Err(StepError::NonFinite {
                input: "agent",
                index: 0,
            });
        }
        if let Some(index) = colliders
            .iter()
            .position(|c| !(is_finite_state(&StateVector::from(c)) && c.radius.is_finite()))
        {
            return Err(StepError::NonFinite {
                input: "colliders",
                index,
            });
        }
        if let Some(index) = trajectory.iter().position(|x| !is_finite_state(x)) {
            return Err(StepError::NonFinite {
                input: "trajectory",
                index,
            });
        }

        self.qp.set_reference(trajectory);
        let agent = agent.with_radius(self.radius);
        constraints::update(
            &self.oracle,
            &agent,
            colliders,
            &self.config,
            &mut self.qp,
            &mut self.half_planes,
        );

        let layout = self.qp.layout;
        let command = match self.solver.solve(&self.qp) {
            Ok(x) => {
                let v = layout.state(1) + 2;
                let a = layout.control(0);
                let command = Command {
                    velocity: Vector2::new(x[v], x[v + 1]),
                    acceleration: Vector2::new(x[a], x[a + 1]),
                    status: CommandStatus::Nominal,
                };
                self.plan = Some(Plan::from_solution(&layout, x));
                self.state = OperatingState::Nominal;
                command
            }
            Err(infeasible) => {
                warn!(
                    "mpc_orca: {}, holding velocity ({:.3}, {:.3})",
                    infeasible, agent.velocity.x, agent.velocity.y
                );
                self.state = OperatingState::Degraded;
                Command {
                    velocity: agent.velocity,
                    acceleration: Vector2::zeros(),
                    status: CommandStatus::Degraded {
                        solver_status: infeasible.status,
                    },
                }
            }
        };

        debug!(
            "mpc_orca: p=({:.3}, {:.3}) v=({:.3}, {:.3}) a=({:.3}, {:.3}) {:?}",
            agent.position.x,
            agent.position.y,
            command.velocity.x,
            command.velocity.y,
            command.acceleration.x,
            command.acceleration.y,
            self.state
        );
        Ok(command)
    }

    pub fn state(&self) -> OperatingState {
        self.state
    }

    /// The plan of the most recent nominal cycle.
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Half-planes of the last cycle, collider-major.
    pub fn half_planes(&self) -> &[HalfPlane] {
        &self.half_planes
    }

    pub fn half_plane(&self, k: usize, i: usize) -> Option<&HalfPlane> {
        if k >= self.config.N {
            return None;
        }
        self.half_planes.get(i * self.config.N + k)
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn config(&self) -> &HorizonConfig {
        &self.config
    }

    pub fn radius(&self) -> float {
        self.radius
    }

    pub fn n_colliders(&self) -> usize {
        self.qp.layout.n_colliders
    }

    pub fn qp(&self) -> &Qp {
        &self.qp
    }
}

fn is_finite_state(x: &StateVector) -> bool {
    x.position.iter().chain(x.velocity.iter()).all(|v| v.is_finite())
}

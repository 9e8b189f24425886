//! Model predictive control with reciprocal collision avoidance.
//!
//! Each controller steers one point-mass agent along a desired trajectory by solving a single
//! sparse QP per cycle. The dynamics, box and cost structure is built once; every cycle only
//! the collision half-planes, the bounds and the initial condition are rewritten before a
//! warm-started OSQP solve.

#![allow(non_snake_case)]

mod agent;
mod constraints;
mod controller;
mod error;
pub mod fleet;
mod horizon;
pub mod predictor;
pub mod qp;
pub mod solver;

pub use agent::{Agent, StateVector};
pub use controller::{Command, CommandStatus, MpcOrca, OperatingState, Plan};
pub use error::{ControllerError, InvalidConfig, StepError};
pub use fleet::{AgentId, Fleet, FleetError};
pub use horizon::{double_integrator, HorizonConfig, NU, NX};
pub use orca::{HalfPlane, HalfPlaneOracle, Orca};
pub use solver::SolverSettings;

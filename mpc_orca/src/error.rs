use osqp_wrapper::SetupError;
use prelude::*;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvalidConfig {
    #[error("horizon must have at least one step")]
    EmptyHorizon,
    #[error("step duration must be positive and finite, got {0}")]
    StepDuration(float),
    #[error("velocity bounds must satisfy v_min < v_max, got [{v_min}, {v_max}]")]
    VelocityBounds { v_min: float, v_max: float },
    #[error("collision lookahead must be positive and finite, got {0}")]
    Lookahead(float),
    #[error("{name} must be positive and finite, got {value}")]
    Weight { name: &'static str, value: float },
    #[error("agent radius must be non-negative and finite, got {0}")]
    Radius(float),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid controller configuration: {0}")]
    Config(#[from] InvalidConfig),
    #[error("unable to set up the QP solver: {0}")]
    Setup(#[from] SetupError),
}

/// Precondition violations detected before any part of the QP is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("desired trajectory has {got} nodes, expected {expected}")]
    TrajectoryLength { expected: usize, got: usize },
    #[error("{got} collider states given, controller was built for {expected}")]
    ColliderCount { expected: usize, got: usize },
    #[error("{input}[{index}] has a non-finite component")]
    NonFinite { input: &'static str, index: usize },
}

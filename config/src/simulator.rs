use std::path::{Path, PathBuf};

use prelude::*;
use serde::Deserialize;

use crate::{invalid, Error};

/// Contents of `simulator.toml`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Simulated duration in seconds.
    pub t: float,
    #[serde(default)]
    pub real_time: bool,
    /// CSV trace destination.
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Controller configuration, relative to the working directory.
    #[serde(default = "default_controller")]
    pub controller: PathBuf,
    #[serde(default)]
    pub trajectory: Trajectory,
    /// How the unicycle command of each robot is derived.
    #[serde(default)]
    pub drive: Drive,
    pub agents: Vec<AgentConfig>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Drive {
    /// Linear speed and heading error from the commanded velocity.
    #[default]
    Velocity,
    /// Integrates the rates that reproduce the commanded acceleration at an offset point.
    Acceleration,
}

/// Logistic easing from each agent's start to its goal.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Trajectory {
    pub growth: float,
    /// Time of the midpoint.
    pub t0: float,
}

impl Default for Trajectory {
    fn default() -> Trajectory {
        Trajectory {
            growth: 0.5,
            t0: 10.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub start: [float; 2],
    pub goal: [float; 2],
    #[serde(default = "default_radius")]
    pub radius: float,
    /// Initial heading of the unicycle in radians.
    #[serde(default)]
    pub heading: float,
    /// Overrides the controller velocity bounds for this agent.
    pub v_min: Option<float>,
    pub v_max: Option<float>,
}

fn default_output() -> PathBuf {
    PathBuf::from("trace.csv")
}

fn default_controller() -> PathBuf {
    PathBuf::from(crate::CONTROLLER_FILE)
}

fn default_radius() -> float {
    0.4
}

impl AgentConfig {
    pub fn start(&self) -> Vector2 {
        Vector2::new(self.start[0], self.start[1])
    }

    pub fn goal(&self) -> Vector2 {
        Vector2::new(self.goal[0], self.goal[1])
    }
}

impl SimulatorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<SimulatorConfig, Error> {
        let config: SimulatorConfig = crate::load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<SimulatorConfig, Error> {
        let config: SimulatorConfig = toml::from_str(contents).map_err(|source| Error::Parse {
            path: crate::SIMULATOR_FILE.into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.t.is_finite() && self.t > 0.0) {
            return Err(invalid("t", "must be positive and finite"));
        }
        let Trajectory { growth, t0 } = self.trajectory;
        if !(growth.is_finite() && growth > 0.0) {
            return Err(invalid("trajectory.growth", "must be positive and finite"));
        }
        if !t0.is_finite() {
            return Err(invalid("trajectory.t0", "must be finite"));
        }
        if self.agents.is_empty() {
            return Err(invalid("agents", "at least one agent is required"));
        }
        for (i, agent) in self.agents.iter().enumerate() {
            let finite = agent
                .start
                .iter()
                .chain(&agent.goal)
                .chain(Some(&agent.heading))
                .all(|v| v.is_finite());
            if !finite {
                return Err(invalid(format!("agents[{}]", i), "positions and heading must be finite"));
            }
            if !(agent.radius.is_finite() && agent.radius >= 0.0) {
                return Err(invalid(format!("agents[{}].radius", i), "must be non-negative"));
            }
            if let (Some(v_min), Some(v_max)) = (agent.v_min, agent.v_max) {
                if !(v_min < v_max) {
                    return Err(invalid(format!("agents[{}]", i), "v_min must be below v_max"));
                }
            }
        }
        Ok(())
    }
}

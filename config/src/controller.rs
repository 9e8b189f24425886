use std::path::Path;
use std::time::Duration;

use mpc_orca::{HorizonConfig, SolverSettings};
use prelude::*;
use serde::Deserialize;

use crate::{invalid, Error};

/// Contents of `controller.toml`. Missing sections and keys take the built-in defaults.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub horizon: Horizon,
    pub weights: Weights,
    pub solver: Solver,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Horizon {
    pub N: usize,
    pub Ts: float,
    pub v_min: float,
    pub v_max: float,
    pub tau: float,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Weights {
    pub position: float,
    pub control: float,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Solver {
    pub eps_abs: float,
    pub eps_rel: float,
    pub max_iter: u32,
    pub polish: bool,
    /// Seconds. No limit when absent.
    pub time_limit: Option<float>,
    pub verbose: bool,
}

impl Default for Horizon {
    fn default() -> Horizon {
        let d = HorizonConfig::default();
        Horizon {
            N: d.N,
            Ts: d.Ts,
            v_min: d.v_min,
            v_max: d.v_max,
            tau: d.tau,
        }
    }
}

impl Default for Weights {
    fn default() -> Weights {
        let d = HorizonConfig::default();
        Weights {
            position: d.position_weight,
            control: d.control_weight,
        }
    }
}

impl Default for Solver {
    fn default() -> Solver {
        let d = SolverSettings::default();
        Solver {
            eps_abs: d.eps_abs,
            eps_rel: d.eps_rel,
            max_iter: d.max_iter,
            polish: d.polish,
            time_limit: d.time_limit.map(|t| t.as_secs_f64()),
            verbose: d.verbose,
        }
    }
}

impl ControllerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<ControllerConfig, Error> {
        let config: ControllerConfig = crate::load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<ControllerConfig, Error> {
        let config: ControllerConfig = toml::from_str(contents).map_err(|source| Error::Parse {
            path: crate::CONTROLLER_FILE.into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.horizon().validate()?;
        let s = &self.solver;
        if !(s.eps_abs >= 0.0 && s.eps_rel >= 0.0) {
            return Err(invalid("solver.eps_abs/eps_rel", "must be non-negative"));
        }
        if s.max_iter == 0 {
            return Err(invalid("solver.max_iter", "must be at least 1"));
        }
        match s.time_limit {
            Some(t) if !(t > 0.0 && Duration::try_from_secs_f64(t).is_ok()) => Err(invalid(
                "solver.time_limit",
                "must be positive and representable as a duration",
            )),
            _ => Ok(()),
        }
    }

    pub fn horizon(&self) -> HorizonConfig {
        let h = &self.horizon;
        HorizonConfig {
            N: h.N,
            Ts: h.Ts,
            v_min: h.v_min,
            v_max: h.v_max,
            tau: h.tau,
            position_weight: self.weights.position,
            control_weight: self.weights.control,
        }
    }

    pub fn solver_settings(&self) -> SolverSettings {
        let s = &self.solver;
        SolverSettings {
            eps_abs: s.eps_abs,
            eps_rel: s.eps_rel,
            max_iter: s.max_iter,
            polish: s.polish,
            // Only unvalidated configurations can be out of range
            time_limit: s
                .time_limit
                .map(|t| Duration::try_from_secs_f64(t).unwrap_or(Duration::MAX)),
            verbose: s.verbose,
        }
    }
}

//! TOML configuration for controllers and fleet simulations.

#![allow(non_snake_case)]

mod controller;
mod simulator;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use controller::{ControllerConfig, Horizon, Solver, Weights};
pub use simulator::{AgentConfig, Drive, SimulatorConfig, Trajectory};

pub static CONTROLLER_FILE: &str = "controller.toml";
pub static SIMULATOR_FILE: &str = "simulator.toml";

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to deserialise {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid controller configuration: {0}")]
    Controller(#[from] mpc_orca::InvalidConfig),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: &'static str },
}

/// Reads and deserialises a TOML file without validating it.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, Error> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| Error::Parse {
        path: path.to_owned(),
        source,
    })
}

fn invalid(field: impl Into<String>, reason: &'static str) -> Error {
    Error::Invalid {
        field: field.into(),
        reason,
    }
}

// Ignore this lint otherwise many warnings are generated for common mathematical notation
#![allow(non_snake_case)]

mod flame_merge;
mod kinematics;
mod setpoint;

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use serde::Serialize;
use stats::OnlineStats;
use thiserror::Error;

use config::{ControllerConfig, Drive, SimulatorConfig};
use mpc_orca::{double_integrator, Agent, CommandStatus, Fleet, FleetError, Orca, StateVector};
use prelude::*;

use kinematics::{acceleration_command, unicycle_command, Unicycle};
use setpoint::{Logistic, Setpoint};

static FLAME_FILE: &str = "flame-graph.html";

#[derive(Debug, Error)]
enum SimulationError {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Fleet(#[from] FleetError),
    #[error("unable to write trace: {0}")]
    Trace(#[from] csv::Error),
    #[error("unable to write trace: {0}")]
    Io(#[from] std::io::Error),
}

/// One CSV row per agent per cycle.
#[derive(Serialize)]
struct Record {
    t: float,
    agent: usize,
    px: float,
    py: float,
    vx: float,
    vy: float,
    ax: float,
    ay: float,
    linear: float,
    angular: float,
    status: &'static str,
}

fn main() {
    env_logger::init();

    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::SIMULATOR_FILE));

    if let Err(err) = run(&path) {
        error!("simulation failed: {}", err);
        process::exit(1);
    }

    if let Err(err) = flame_merge::write_flame(Path::new(FLAME_FILE)) {
        error!("unable to write {}: {}", FLAME_FILE, err);
    }
}

fn run(path: &Path) -> Result<(), SimulationError> {
    let sim_config = SimulatorConfig::load(path)?;
    let controller_config = ControllerConfig::load(&sim_config.controller)?;
    let horizon = controller_config.horizon();
    let settings = controller_config.solver_settings();
    let N = horizon.N;
    let Ts = horizon.Ts;

    let logistic = Logistic {
        growth: sim_config.trajectory.growth,
        t0: sim_config.trajectory.t0,
    };
    let setpoints: Vec<Setpoint> = sim_config
        .agents
        .iter()
        .map(|agent| Setpoint {
            start: agent.start(),
            goal: agent.goal(),
            logistic,
        })
        .collect();
    let mut headings: Vec<float> = sim_config.agents.iter().map(|a| a.heading).collect();
    let mut drives = vec![Unicycle::default(); sim_config.agents.len()];

    let mut fleet: Fleet = Fleet::new();
    for (id, agent) in sim_config.agents.iter().enumerate() {
        fleet.insert_agent(id, Agent::new(agent.start(), Vector2::zeros(), agent.radius))?;
    }
    let n_agents = sim_config.agents.len();
    for (id, agent) in sim_config.agents.iter().enumerate() {
        let mut agent_horizon = horizon.clone();
        agent_horizon.v_min = agent.v_min.unwrap_or(horizon.v_min);
        agent_horizon.v_max = agent.v_max.unwrap_or(horizon.v_max);
        let colliders = (0..n_agents).filter(|&other| other != id).collect();
        fleet.attach_controller(id, colliders, agent_horizon, &settings, Orca)?;
    }

    let mut trace = csv::Writer::from_path(&sim_config.output)?;
    let (A, B) = double_integrator(Ts);
    let dt_duration = Duration::from_secs_f64(Ts);
    let n_steps = (sim_config.t / Ts).round() as usize;
    let mut stats = OnlineStats::new();
    let mut degraded = 0;

    info!(
        "simulating {} agents for {} s ({} cycles, N = {}, Ts = {})",
        n_agents, sim_config.t, n_steps, N, Ts
    );

    for i in 0..n_steps {
        let t = i as float * Ts;
        let cycle_start = Instant::now();

        let commands = fleet.step(|id, _| setpoints[id].trajectory(t, N, Ts))?;
        let elapsed = cycle_start.elapsed();
        stats.add(elapsed.as_secs_f64() * 1e3);

        for (&id, command) in &commands {
            let agent = *fleet.agent(id).ok_or(FleetError::UnknownAgent(id))?;
            let unicycle = match sim_config.drive {
                Drive::Velocity => unicycle_command(&command.velocity, headings[id]),
                Drive::Acceleration => {
                    let rates = acceleration_command(&command.acceleration, &drives[id], headings[id]);
                    Unicycle {
                        linear: drives[id].linear + rates.linear * Ts,
                        angular: drives[id].angular + rates.angular * Ts,
                    }
                }
            };
            drives[id] = unicycle;
            let status = match command.status {
                CommandStatus::Nominal => "nominal",
                CommandStatus::Degraded { solver_status } => {
                    degraded += 1;
                    solver_status
                }
            };
            trace.serialize(Record {
                t,
                agent: id,
                px: agent.position.x,
                py: agent.position.y,
                vx: command.velocity.x,
                vy: command.velocity.y,
                ax: command.acceleration.x,
                ay: command.acceleration.y,
                linear: unicycle.linear,
                angular: unicycle.angular,
                status,
            })?;

            let next = A * StateVector::from(&agent).to_vector() + B * command.acceleration;
            fleet.update_state(id, StateVector::from_slice(next.as_slice()))?;
            // angular is a rate in both drive models
            headings[id] = phase_unwrap(0.0, headings[id] + unicycle.angular * Ts);
        }

        if i % 50 == 0 {
            info!("t = {:.1} s, cycle took {:.3} ms", t, elapsed.as_secs_f64() * 1e3);
        }
        debug!("cycle {} took {:?}", i, elapsed);

        if sim_config.real_time && elapsed < dt_duration {
            thread::sleep(dt_duration - elapsed);
        }
    }
    trace.flush()?;

    info!(
        "controller cycle: mean {:.3} ms, std dev {:.3} ms over {} cycles",
        stats.mean(),
        stats.stddev(),
        n_steps
    );
    info!("{} degraded commands", degraded);
    for (id, agent) in fleet.agents() {
        info!(
            "agent {} finished {:.3} m from its goal",
            id,
            (agent.position - setpoints[id].goal).norm()
        );
    }
    info!("trace written to {}", sim_config.output.display());
    Ok(())
}

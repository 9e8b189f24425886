//! A persistent, warm-started OSQP problem kept in step with a [`Qp`].

use std::time::Duration;

use osqp_wrapper::{status_name, Problem, Settings, SetupError, Status};
use prelude::*;
use thiserror::Error;

use crate::qp::Qp;

#[derive(Clone, Debug, PartialEq)]
pub struct SolverSettings {
    pub eps_abs: float,
    pub eps_rel: float,
    pub max_iter: u32,
    pub polish: bool,
    pub time_limit: Option<Duration>,
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> SolverSettings {
        SolverSettings {
            eps_abs: 1e-5,
            eps_rel: 1e-5,
            max_iter: 4000,
            polish: true,
            time_limit: None,
            verbose: false,
        }
    }
}

impl SolverSettings {
    /// Warm starting is always enabled.
    pub fn to_osqp(&self) -> Settings {
        Settings::default()
            .verbose(self.verbose)
            .warm_start(true)
            .polish(self.polish)
            .eps_abs(self.eps_abs)
            .eps_rel(self.eps_rel)
            .max_iter(self.max_iter)
            .time_limit(self.time_limit)
    }
}

/// The solve did not end with a solution. Carries the solver status for diagnostics.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("qp not solved: {status}")]
pub struct Infeasible {
    pub status: &'static str,
}

pub struct IncrementalSolver {
    problem: Problem,
    x: Vec<float>,
}

impl IncrementalSolver {
    pub fn new(qp: &Qp, settings: &SolverSettings) -> Result<IncrementalSolver, SetupError> {
        let problem = Problem::new(&qp.P, &qp.q, &qp.A, &qp.l, &qp.u, &settings.to_osqp())?;
        Ok(IncrementalSolver {
            problem,
            x: vec![0.0; qp.layout.n_vars()],
        })
    }

    /// Pushes the linear cost, the constraint values and the bounds of `qp` and solves.
    /// Only a fully solved problem yields a solution.
    ///
    /// Nothing reaches the solver unless every bound is valid and `q` and `A` are finite.
    /// After any unsolved cycle the warm start is reset, so the next solve starts from zero.
    pub fn solve(&mut self, qp: &Qp) -> Result<&[float], Infeasible> {
        if self.problem.check_bounds(&qp.l, &qp.u).is_err() {
            return Err(Infeasible {
                status: "invalid bounds",
            });
        }
        if !(qp.q.iter().chain(qp.A.data()).all(|v| v.is_finite())) {
            return Err(Infeasible {
                status: "non-finite cost or constraints",
            });
        }

        self.problem.update_lin_cost(&qp.q);
        self.problem.update_A_values(&qp.A);
        self.problem
            .update_bounds(&qp.l, &qp.u)
            .map_err(|_| Infeasible {
                status: "invalid bounds",
            })?;

        let status = match self.problem.solve() {
            Status::Solved(solution) => {
                self.x.copy_from_slice(solution.x());
                return Ok(&self.x);
            }
            status => status_name(&status),
        };
        self.problem.cold_start();
        Err(Infeasible { status })
    }

    /// The last solution, or zeros before the first successful solve. Unsolved cycles leave
    /// it unchanged.
    pub fn last_solution(&self) -> &[float] {
        &self.x
    }
}

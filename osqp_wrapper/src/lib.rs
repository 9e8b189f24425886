//! A persistent OSQP problem built from `sparse` matrices.
//!
//! The problem is set up once and then updated in place. Constraint matrix updates must keep
//! the sparsity pattern used at setup.

use log::warn;
use osqp::Problem as InnerProblem;
pub use osqp::{Settings, SetupError, Solution, Status};
use prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    #[error("bound vectors have length {got}, expected {expected}")]
    Length { expected: usize, got: usize },
    #[error("lower bound {l} exceeds upper bound {u} at row {row}")]
    Crossed { row: usize, l: float, u: float },
    #[error("bound at row {row} is NaN")]
    NaN { row: usize },
}

#[allow(non_snake_case)]
pub struct Problem {
    inner: InnerProblem,
    n: usize,
    m: usize,
    A_pattern: (Vec<usize>, Vec<usize>),
}

impl Problem {
    #[allow(non_snake_case)]
    pub fn new(
        P: &sparse::CscMatrix,
        q: &[float],
        A: &sparse::CscMatrix,
        l: &[float],
        u: &[float],
        settings: &Settings,
    ) -> Result<Problem, SetupError> {
        let _guard = flame::start_guard("osqp setup");
        let (m, n) = A.shape();
        let inner = InnerProblem::new(convert_sparse(P), q, convert_sparse(A), l, u, settings)?;
        Ok(Problem {
            inner,
            n,
            m,
            A_pattern: (A.indptr().to_vec(), A.indices().to_vec()),
        })
    }

    /// Number of decision variables.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of constraint rows.
    pub fn m(&self) -> usize {
        self.m
    }

    /// Checks bounds the way [`Problem::update_bounds`] does, without touching the problem.
    pub fn check_bounds(&self, l: &[float], u: &[float]) -> Result<(), BoundsError> {
        check_bounds(self.m, l, u)
    }

    /// Resets the primal and dual warm start to zero.
    pub fn cold_start(&mut self) {
        let _guard = flame::start_guard("osqp cold_start");
        self.inner.warm_start(&vec![0.0; self.n], &vec![0.0; self.m]);
    }

    pub fn update_lin_cost(&mut self, q: &[float]) {
        let _guard = flame::start_guard("osqp update_lin_cost");
        self.inner.update_lin_cost(q)
    }

    /// Replaces both bound vectors. Bounds OSQP would reject are reported instead of being
    /// passed on.
    pub fn update_bounds(&mut self, l: &[float], u: &[float]) -> Result<(), BoundsError> {
        let _guard = flame::start_guard("osqp update_bounds");
        check_bounds(self.m, l, u)?;
        self.inner.update_bounds(l, u);
        Ok(())
    }

    /// Replaces the values of the constraint matrix. The sparsity pattern must match the
    /// one given at setup.
    #[allow(non_snake_case)]
    pub fn update_A_values(&mut self, A: &sparse::CscMatrix) {
        let _guard = flame::start_guard("osqp update_A_values");
        assert_eq!(A.shape(), (self.m, self.n), "constraint matrix shape changed");
        assert!(
            A.indptr() == &self.A_pattern.0[..] && A.indices() == &self.A_pattern.1[..],
            "constraint matrix sparsity changed"
        );
        self.inner.update_A(convert_sparse(A))
    }

    pub fn solve(&mut self) -> Status<'_> {
        let _guard = flame::start_guard("osqp solve");
        self.inner.solve()
    }
}

fn check_bounds(m: usize, l: &[float], u: &[float]) -> Result<(), BoundsError> {
    for len in [l.len(), u.len()] {
        if len != m {
            return Err(BoundsError::Length {
                expected: m,
                got: len,
            });
        }
    }
    for (row, (&l, &u)) in l.iter().zip(u).enumerate() {
        if l.is_nan() || u.is_nan() {
            return Err(BoundsError::NaN { row });
        }
        if l > u {
            warn!("l > u at i={} l={} u={}", row, l, u);
            return Err(BoundsError::Crossed { row, l, u });
        }
    }
    Ok(())
}

/// Human readable OSQP status, used for diagnostics.
pub fn status_name(status: &Status) -> &'static str {
    match status {
        Status::Solved(_) => "solved",
        Status::SolvedInaccurate(_) => "solved inaccurate",
        Status::MaxIterationsReached(_) => "maximum iterations reached",
        Status::TimeLimitReached(_) => "time limit reached",
        Status::PrimalInfeasible(_) => "primal infeasible",
        Status::PrimalInfeasibleInaccurate(_) => "primal infeasible inaccurate",
        Status::DualInfeasible(_) => "dual infeasible",
        Status::DualInfeasibleInaccurate(_) => "dual infeasible inaccurate",
        Status::NonConvex(_) => "non convex",
        _ => "unknown",
    }
}

pub fn convert_sparse(this: &sparse::CscMatrix) -> osqp::CscMatrix<'_> {
    let (nrows, ncols) = this.shape();
    osqp::CscMatrix {
        nrows,
        ncols,
        indptr: this.indptr().into(),
        indices: this.indices().into(),
        data: this.data().into(),
    }
}

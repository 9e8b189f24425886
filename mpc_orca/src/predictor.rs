//! Constant velocity predictions over the horizon.

use prelude::*;

use crate::Agent;

/// The agent as it will be `k` steps ahead if it keeps its current velocity.
pub fn at_step(agent: &Agent, k: usize, Ts: float) -> Agent {
    Agent {
        position: agent.position + agent.velocity * (k as float * Ts),
        ..*agent
    }
}

/// Predicted agent snapshots for steps `0..N`.
#[derive(Clone, Debug)]
pub struct Prediction {
    agent: Agent,
    Ts: float,
    k: usize,
    N: usize,
}

impl Iterator for Prediction {
    type Item = Agent;

    fn next(&mut self) -> Option<Agent> {
        if self.k >= self.N {
            return None;
        }
        let predicted = at_step(&self.agent, self.k, self.Ts);
        self.k += 1;
        Some(predicted)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.N - self.k;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Prediction {}

pub fn predict_agents(agent: &Agent, N: usize, Ts: float) -> Prediction {
    Prediction {
        agent: *agent,
        Ts,
        k: 0,
        N,
    }
}

/// `position + k * velocity * Ts` for `k` in `0..N`.
pub fn predict(agent: &Agent, N: usize, Ts: float) -> impl ExactSizeIterator<Item = Vector2> + Clone {
    predict_agents(agent, N, Ts).map(|a| a.position)
}

use prelude::*;

pub use orca::Agent;

/// `[px, py, vx, vy]` at one horizon node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateVector {
    pub position: Vector2,
    pub velocity: Vector2,
}

impl StateVector {
    pub fn new(position: Vector2, velocity: Vector2) -> StateVector {
        StateVector { position, velocity }
    }

    pub fn stationary(position: Vector2) -> StateVector {
        StateVector::new(position, Vector2::zeros())
    }

    pub fn to_vector(&self) -> Vector4 {
        Vector4::new(
            self.position.x,
            self.position.y,
            self.velocity.x,
            self.velocity.y,
        )
    }

    pub fn from_slice(x: &[float]) -> StateVector {
        assert_eq!(x.len(), 4, "state vectors have four components");
        StateVector::new(Vector2::new(x[0], x[1]), Vector2::new(x[2], x[3]))
    }

    pub fn with_radius(&self, radius: float) -> Agent {
        Agent::new(self.position, self.velocity, radius)
    }
}

impl From<&Agent> for StateVector {
    fn from(agent: &Agent) -> StateVector {
        StateVector::new(agent.position, agent.velocity)
    }
}

//! Global setpoint trajectories.

use mpc_orca::StateVector;
use prelude::*;

/// `1 / (1 + exp(-growth (t - t0)))`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Logistic {
    pub growth: float,
    pub t0: float,
}

impl Logistic {
    pub fn value(&self, t: float) -> float {
        1.0 / (1.0 + (-self.growth * (t - self.t0)).exp())
    }

    pub fn derivative(&self, t: float) -> float {
        let s = self.value(t);
        self.growth * s * (1.0 - s)
    }
}

/// Eases from `start` to `goal` along a straight line.
#[derive(Clone, Copy, Debug)]
pub struct Setpoint {
    pub start: Vector2,
    pub goal: Vector2,
    pub logistic: Logistic,
}

impl Setpoint {
    pub fn position(&self, t: float) -> Vector2 {
        let s = self.logistic.value(t);
        self.goal * s + self.start * (1.0 - s)
    }

    pub fn velocity(&self, t: float) -> Vector2 {
        (self.goal - self.start) * self.logistic.derivative(t)
    }

    pub fn state(&self, t: float) -> StateVector {
        StateVector::new(self.position(t), self.velocity(t))
    }

    /// Desired states at `t + k Ts` for `k` in `0..=N`.
    pub fn trajectory(&self, t: float, N: usize, Ts: float) -> Vec<StateVector> {
        (0..=N).map(|k| self.state(t + k as float * Ts)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn setpoint() -> Setpoint {
        Setpoint {
            start: Vector2::new(-7.0, -7.0),
            goal: Vector2::new(7.0, 7.0),
            logistic: Logistic {
                growth: 0.5,
                t0: 10.0,
            },
        }
    }

    #[test]
    fn moves_from_start_to_goal() {
        let s = setpoint();
        assert_relative_eq!(s.position(-30.0), s.start, epsilon = 1e-6);
        assert_relative_eq!(s.position(50.0), s.goal, epsilon = 1e-6);
        assert_relative_eq!(s.position(10.0), Vector2::zeros(), epsilon = 1e-12);
        assert_relative_eq!(s.velocity(50.0), Vector2::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn velocity_is_derivative_of_position() {
        let s = setpoint();
        let h = 1e-6;
        for &t in &[0.0, 5.0, 10.0, 12.5] {
            let numeric = (s.position(t + h) - s.position(t - h)) / (2.0 * h);
            assert_relative_eq!(s.velocity(t), numeric, epsilon = 1e-6);
        }
        // Peak speed at the midpoint
        assert_relative_eq!(s.velocity(10.0), Vector2::new(1.75, 1.75), epsilon = 1e-12);
    }

    #[test]
    fn trajectory_samples_every_node() {
        let s = setpoint();
        let trajectory = s.trajectory(3.0, 10, 0.1);
        assert_eq!(trajectory.len(), 11);
        assert_eq!(trajectory[0], s.state(3.0));
        assert_relative_eq!(trajectory[10].position, s.position(4.0), epsilon = 1e-12);
    }
}

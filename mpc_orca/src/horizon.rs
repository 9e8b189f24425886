use prelude::*;

use crate::InvalidConfig;

/// Number of states per horizon node: `[px, py, vx, vy]`.
pub const NX: usize = 4;
/// Number of inputs per horizon step: `[ax, ay]`.
pub const NU: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct HorizonConfig {
    /// Horizon length in steps.
    pub N: usize,
    /// Step duration in seconds.
    pub Ts: float,
    /// Lower bound on each velocity component.
    pub v_min: float,
    /// Upper bound on each velocity component.
    pub v_max: float,
    /// Collision avoidance lookahead in seconds.
    pub tau: float,
    /// Q weight on the position components. Velocity is not penalised.
    pub position_weight: float,
    /// R weight on both acceleration components.
    pub control_weight: float,
}

impl Default for HorizonConfig {
    fn default() -> HorizonConfig {
        HorizonConfig {
            N: 10,
            Ts: 0.1,
            v_min: -1.0,
            v_max: 1.0,
            tau: 10.0,
            position_weight: 1.0,
            control_weight: 0.01,
        }
    }
}

impl HorizonConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.N < 1 {
            return Err(InvalidConfig::EmptyHorizon);
        }
        if !(self.Ts.is_finite() && self.Ts > 0.0) {
            return Err(InvalidConfig::StepDuration(self.Ts));
        }
        if !(self.v_min < self.v_max) {
            return Err(InvalidConfig::VelocityBounds {
                v_min: self.v_min,
                v_max: self.v_max,
            });
        }
        if !(self.tau.is_finite() && self.tau > 0.0) {
            return Err(InvalidConfig::Lookahead(self.tau));
        }
        for &(name, value) in &[
            ("position_weight", self.position_weight),
            ("control_weight", self.control_weight),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(InvalidConfig::Weight { name, value });
            }
        }
        Ok(())
    }

    /// Acceleration bound implied by reaching either velocity limit within one step.
    pub fn control_bounds(&self) -> (float, float) {
        (self.v_min / self.Ts, self.v_max / self.Ts)
    }
}

/// Exact discretisation of the planar double integrator.
pub fn double_integrator(Ts: float) -> (Matrix4, Matrix4x2) {
    #[rustfmt::skip]
    let A = Matrix4::new(
        1.0, 0.0, Ts,  0.0,
        0.0, 1.0, 0.0, Ts,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    );
    let h = 0.5 * Ts * Ts;
    #[rustfmt::skip]
    let B = Matrix4x2::new(
        h,   0.0,
        0.0, h,
        Ts,  0.0,
        0.0, Ts,
    );
    (A, B)
}

//! Reciprocal velocity obstacles for pairs of moving circular agents.
//!
//! For an agent and one collider the oracle returns the half-plane of velocities
//! `normal · v <= normal · reference_velocity` that keeps the pair apart for `tau` seconds,
//! with each agent taking half of the required change.

use prelude::*;

const EPSILON: float = 1e-9;

/// A moving disc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub position: Vector2,
    pub velocity: Vector2,
    pub radius: float,
}

impl Agent {
    pub fn new(position: Vector2, velocity: Vector2, radius: float) -> Agent {
        Agent {
            position,
            velocity,
            radius,
        }
    }
}

/// `normal · v <= normal · reference_velocity`, with `normal` a unit vector pointing out of
/// the permitted region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfPlane {
    pub reference_velocity: Vector2,
    pub normal: Vector2,
}

impl HalfPlane {
    /// Right-hand side of the constraint.
    pub fn bound(&self) -> float {
        self.normal.dot(&self.reference_velocity)
    }

    pub fn contains(&self, velocity: &Vector2, tolerance: float) -> bool {
        self.normal.dot(velocity) <= self.bound() + tolerance
    }
}

pub trait HalfPlaneOracle {
    fn half_plane(&self, agent: &Agent, collider: &Agent, tau: float, dt: float) -> HalfPlane;
}

/// Optimal reciprocal collision avoidance.
#[derive(Clone, Copy, Debug, Default)]
pub struct Orca;

impl HalfPlaneOracle for Orca {
    fn half_plane(&self, agent: &Agent, collider: &Agent, tau: float, dt: float) -> HalfPlane {
        let (u, n) = avoidance_velocity(agent, collider, tau, dt);
        // n points into the permitted region
        HalfPlane {
            reference_velocity: agent.velocity + u * 0.5,
            normal: -n,
        }
    }
}

/// Smallest change `u` to the relative velocity that leaves the truncated velocity obstacle,
/// and the unit normal `n` of the obstacle boundary at the exit point. Velocities `v` with
/// `n · (v - v_agent - u) >= 0` are collision free over `tau`.
///
/// Agents that already overlap are pushed apart within a single `dt`.
pub fn avoidance_velocity(
    agent: &Agent,
    collider: &Agent,
    tau: float,
    dt: float,
) -> (Vector2, Vector2) {
    let x = collider.position - agent.position;
    let v = agent.velocity - collider.velocity;
    let r = agent.radius + collider.radius;
    let x_len_sq = x.norm_squared();

    // Touching counts as overlapping, which also covers coincident discs of zero radius
    if x_len_sq <= r * r {
        return project_on_cap(&x, &v, r, dt);
    }

    // The boundary between the cap and the legs is the cap centre moved towards the origin
    // by cos^2 of the cone half-angle.
    let adjusted_center = x / tau * (1.0 - (r * r) / x_len_sq);

    if (v - adjusted_center).dot(&adjusted_center) < 0.0 {
        project_on_cap(&x, &v, r, tau)
    } else {
        // Rotate x onto the leg on the same side as v and project v onto it
        let leg_len = (x_len_sq - r * r).sqrt();
        let sine = r.copysign(perp_dot(&v, &x));
        let rotated_x = Vector2::new(leg_len * x.x + sine * x.y, -sine * x.x + leg_len * x.y) / x_len_sq;
        let mut n = Vector2::new(rotated_x.y, -rotated_x.x);
        if sine < 0.0 {
            n = -n;
        }
        let u = rotated_x * v.dot(&rotated_x) - v;
        (u, n)
    }
}

fn project_on_cap(x: &Vector2, v: &Vector2, r: float, t: float) -> (Vector2, Vector2) {
    let w = v - x / t;
    let w_len = w.norm();
    let n = if w_len > EPSILON {
        w / w_len
    } else if x.norm() > EPSILON {
        // v sits on the cap centre, leave directly away from the collider
        -x.normalize()
    } else {
        Vector2::x()
    };
    let u = n * (r / t) - w;
    (u, n)
}

/// `a.x * b.y - a.y * b.x`
fn perp_dot(a: &Vector2, b: &Vector2) -> float {
    a.x * b.y - a.y * b.x
}

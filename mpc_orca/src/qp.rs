//! The fixed structure of the tracking QP.
//!
//! Decision vector: `[x_0, ..., x_N, u_0, ..., u_{N-1}]` with `x_k = [px, py, vx, vy]` and
//! `u_k = [ax, ay]`. Constraint rows are, in order, the dynamics equalities, a box over every
//! variable and one half-plane row per (collider, step) pair.

use nalgebra::{Matrix1x2, Matrix2, U1, U2};
use prelude::*;
use sparse::{BlockRef, CscMatrix};

use crate::{double_integrator, HorizonConfig, StateVector, NU, NX};

/// Index arithmetic for the decision vector and the constraint rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub N: usize,
    pub n_colliders: usize,
}

impl Layout {
    pub fn n_states(&self) -> usize {
        (self.N + 1) * NX
    }

    pub fn n_vars(&self) -> usize {
        self.n_states() + self.N * NU
    }

    /// Offset of state node `k`.
    pub fn state(&self, k: usize) -> usize {
        debug_assert!(k <= self.N);
        k * NX
    }

    /// Offset of control step `k`.
    pub fn control(&self, k: usize) -> usize {
        debug_assert!(k < self.N);
        self.n_states() + k * NU
    }

    pub fn n_eq(&self) -> usize {
        self.n_states()
    }

    pub fn n_box(&self) -> usize {
        self.n_vars()
    }

    /// Row of the half-plane constraining node `k + 1` against collider `i`.
    pub fn collision_row(&self, k: usize, i: usize) -> usize {
        debug_assert!(k < self.N && i < self.n_colliders);
        self.n_eq() + self.n_box() + i * self.N + k
    }

    pub fn n_constraints(&self) -> usize {
        self.n_eq() + self.n_box() + self.N * self.n_colliders
    }
}

/// The two constraint matrix cells holding the normal of one collision half-plane.
#[derive(Debug)]
pub struct CollisionSlot {
    block: BlockRef<U1, U2>,
    /// Row in `l`, `u` and `A`.
    pub row: usize,
    pub step: usize,
    pub collider: usize,
    /// CSC data indices of the `n.x` and `n.y` coefficients.
    pub entries: [usize; 2],
}

impl CollisionSlot {
    /// Writes the half-plane normal into `A`.
    pub fn set_normal(&self, A: &mut CscMatrix, normal: &Vector2) {
        A.set_block(&self.block, &Matrix1x2::new(normal.x, normal.y));
    }
}

/// Maps each (step, collider) pair to its physical location in `A`. Slots are stored
/// collider-major, matching the row order.
#[derive(Debug)]
pub struct ConstraintIndexMap {
    N: usize,
    slots: Vec<CollisionSlot>,
}

impl ConstraintIndexMap {
    fn new(layout: &Layout, A: &CscMatrix, blocks: Vec<(usize, usize, BlockRef<U1, U2>)>) -> Self {
        let slots = blocks
            .into_iter()
            .map(|(k, i, block)| {
                let row = layout.collision_row(k, i);
                let col = layout.state(k + 1) + 2;
                let entries = A.block_entries(&block);
                assert_eq!(entries.len(), 2, "collision slot must own two stored entries");
                for (j, &(r, c, index)) in entries.iter().enumerate() {
                    assert_eq!((r, c), (row, col + j), "collision slot placed at wrong cell");
                    assert_eq!(A.coordinates_of(index), (r, c), "collision slot index mismatch");
                }
                CollisionSlot {
                    block,
                    row,
                    step: k,
                    collider: i,
                    entries: [entries[0].2, entries[1].2],
                }
            })
            .collect::<Vec<_>>();

        for (n, slot) in slots.iter().enumerate() {
            assert_eq!(n, slot.collider * layout.N + slot.step, "collision slots out of order");
        }

        ConstraintIndexMap { N: layout.N, slots }
    }

    pub fn slot(&self, k: usize, i: usize) -> &CollisionSlot {
        &self.slots[i * self.N + k]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollisionSlot> {
        self.slots.iter()
    }
}

pub struct Qp {
    pub layout: Layout,
    pub P: CscMatrix,
    pub q: Vec<float>,
    pub A: CscMatrix,
    pub l: Vec<float>,
    pub u: Vec<float>,
    pub index_map: ConstraintIndexMap,
    position_weight: float,
}

impl Qp {
    /// Sets `q = -Q x_ref` for every node. The control part of `q` stays zero.
    pub(crate) fn set_reference(&mut self, trajectory: &[StateVector]) {
        assert_eq!(trajectory.len(), self.layout.N + 1, "reference must cover every node");
        for (k, reference) in trajectory.iter().enumerate() {
            let offset = self.layout.state(k);
            self.q[offset] = -self.position_weight * reference.position.x;
            self.q[offset + 1] = -self.position_weight * reference.position.y;
        }
    }

    /// Pins node 0 to `x0` through the first block of equality rows.
    pub(crate) fn set_initial_state(&mut self, x0: &StateVector) {
        let x0 = x0.to_vector();
        for j in 0..NX {
            self.l[j] = -x0[j];
            self.u[j] = -x0[j];
        }
    }
}

/// Assembles the QP for a horizon with `n_colliders` half-plane constraints per step.
pub fn build(config: &HorizonConfig, n_colliders: usize, x0: &StateVector) -> Qp {
    let _guard = flame::start_guard("qp build");

    let N = config.N;
    let layout = Layout { N, n_colliders };
    let n_states = layout.n_states();
    let n_vars = layout.n_vars();

    // Cost
    let w = config.position_weight;
    let Q = Matrix4::from_diagonal(&Vector4::new(w, w, 0.0, 0.0));
    let R = Matrix2::from_diagonal_element(config.control_weight);
    let P = sparse::block_diag(&[
        sparse::kron_eye(N + 1, sparse::block(&Q)),
        sparse::kron_eye(N, sparse::block(&R)),
    ])
    .build_csc();

    // Dynamics: -x_k + A_d x_{k-1} + B_d u_{k-1} = 0, and -x_0 = -x0
    let (A_d, B_d) = double_integrator(config.Ts);
    let Ax = -sparse::eye(n_states)
        + sparse::bmat(&[
            &[None, Some(sparse::zeros(NX, NX))],
            &[Some(sparse::kron_eye(N, sparse::block(&A_d))), None],
        ]);
    let Bu = sparse::vstack(&[
        sparse::zeros(NX, N * NU),
        sparse::kron_eye(N, sparse::block(&B_d)),
    ]);
    let A_eq = sparse::hstack(&[Ax, Bu]);

    let A_box = sparse::eye(n_vars);

    let mut rows = Vec::with_capacity(2 + N * n_colliders);
    rows.push(A_eq);
    rows.push(A_box);
    let mut blocks = Vec::with_capacity(N * n_colliders);
    for i in 0..n_colliders {
        for k in 0..N {
            let (cell, block) = sparse::block_mut(&Matrix1x2::repeat(true));
            let col = layout.state(k + 1) + 2;
            rows.push(sparse::hstack(&[
                sparse::zeros(1, col),
                cell,
                sparse::zeros(1, n_vars - col - 2),
            ]));
            blocks.push((k, i, block));
        }
    }
    let A = sparse::vstack(&rows).build_csc();
    assert_eq!(A.shape(), (layout.n_constraints(), n_vars));
    assert_eq!(P.shape(), (n_vars, n_vars));

    let index_map = ConstraintIndexMap::new(&layout, &A, blocks);

    // Bounds
    let (a_min, a_max) = config.control_bounds();
    let mut l = vec![0.0; layout.n_constraints()];
    let mut u = vec![0.0; layout.n_constraints()];
    let box_start = layout.n_eq();
    for k in 0..=N {
        let row = box_start + layout.state(k);
        l[row..row + 2].copy_from_slice(&[NEG_INFINITY; 2]);
        u[row..row + 2].copy_from_slice(&[INFINITY; 2]);
        l[row + 2..row + 4].copy_from_slice(&[config.v_min; 2]);
        u[row + 2..row + 4].copy_from_slice(&[config.v_max; 2]);
    }
    for k in 0..N {
        let row = box_start + layout.control(k);
        l[row..row + NU].copy_from_slice(&[a_min; NU]);
        u[row..row + NU].copy_from_slice(&[a_max; NU]);
    }

    let mut qp = Qp {
        layout,
        P,
        q: vec![0.0; n_vars],
        A,
        l,
        u,
        index_map,
        position_weight: w,
    };
    qp.set_initial_state(x0);
    qp.set_reference(&vec![StateVector::stationary(x0.position); N + 1]);
    qp
}

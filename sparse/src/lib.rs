//! Compressed sparse column matrices assembled from dense and sparse blocks.
//!
//! Blocks created with [`block_mut`] are tracked through every composition
//! (stacking, block diagonals, `bmat`). Once the final matrix is built the
//! returned [`BlockRef`] addresses the positions of those entries in the CSC
//! data array, so values can be rewritten without changing the sparsity
//! pattern.

use itertools::Itertools;
use nalgebra::{DMatrix, Dim, Matrix, Storage};
use std::convert::AsRef;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Add, Mul, Neg};
use std::sync::atomic::{AtomicUsize, Ordering};

#[allow(non_camel_case_types)]
type float = f64;

#[derive(Debug)]
pub struct BlockRef<M, N> {
    id: usize,
    nrows: usize,
    ncols: usize,
    phantom: PhantomData<(M, N)>,
}

impl<M, N> BlockRef<M, N> {
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }
}

/// One occurrence of a tracked block inside a builder.
#[derive(Clone, Debug)]
struct Placement {
    id: usize,
    row: usize,
    col: usize,
    pattern: DMatrix<bool>,
}

#[derive(Clone, Debug)]
pub struct Builder {
    coords: Vec<(usize, usize, float)>,
    placements: Vec<Placement>,
    nrows: usize,
    ncols: usize,
}

impl Builder {
    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Builder {
        Builder {
            coords: Vec::with_capacity(nnz),
            placements: Vec::new(),
            nrows,
            ncols,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// An empty 0x0 builder with room for everything in `blocks`.
    fn for_blocks(blocks: &[&Builder]) -> Builder {
        let nnz = blocks.iter().map(|b| b.coords.len()).sum();
        let mut builder = Builder::with_capacity(0, 0, nnz);
        builder
            .placements
            .reserve(blocks.iter().map(|b| b.placements.len()).sum());
        builder
    }

    /// Copies `block` into `self` with its top-left corner at `(row, col)`.
    fn place(&mut self, block: &Builder, row: usize, col: usize) {
        self.coords
            .extend(block.coords.iter().map(|&(r, c, v)| (r + row, c + col, v)));
        self.placements.extend(block.placements.iter().map(|p| Placement {
            row: p.row + row,
            col: p.col + col,
            ..p.clone()
        }));
    }

    pub fn build_csc(&mut self) -> CscMatrix {
        // Duplicates in a cell are summed. Explicit zeros stay so tracked blocks always own a
        // slot in the data array.
        let mut coords = mem::take(&mut self.coords);
        coords.sort_unstable_by_key(|&(r, c, _)| (c, r));
        self.coords = coords
            .into_iter()
            .coalesce(|a, b| {
                if (a.0, a.1) == (b.0, b.1) {
                    Ok((a.0, a.1, a.2 + b.2))
                } else {
                    Err((a, b))
                }
            })
            .collect();

        let mut indptr = vec![0; self.ncols + 1];
        for &(_, c, _) in &self.coords {
            indptr[c + 1] += 1;
        }
        for c in 0..self.ncols {
            indptr[c + 1] += indptr[c];
        }
        let indices: Vec<usize> = self.coords.iter().map(|&(r, _, _)| r).collect();
        let data: Vec<float> = self.coords.iter().map(|&(_, _, v)| v).collect();

        let mut tracked: Vec<TrackedBlock> = self
            .placements
            .iter()
            .map(|p| {
                let (nrows, ncols) = p.pattern.shape();
                let slots = DMatrix::from_fn(nrows, ncols, |r, c| {
                    if !p.pattern[(r, c)] {
                        return None;
                    }
                    let start = indptr[p.col + c];
                    let end = indptr[p.col + c + 1];
                    let offset = indices[start..end]
                        .binary_search(&(p.row + r))
                        .expect("tracked entry missing from csc columns");
                    Some(start + offset)
                });
                TrackedBlock {
                    id: p.id,
                    row: p.row,
                    col: p.col,
                    slots,
                }
            })
            .collect();
        tracked.sort_by_key(|t| t.id);

        CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
            tracked,
        }
    }
}

impl AsRef<Builder> for Builder {
    fn as_ref(&self) -> &Builder {
        self
    }
}

impl Add for Builder {
    type Output = Builder;

    fn add(self, other: Builder) -> Builder {
        add(&[self, other])
    }
}

impl<'a> Add<&'a Builder> for Builder {
    type Output = Builder;

    fn add(self, other: &'a Builder) -> Builder {
        add(&[&self, other])
    }
}

impl<'a> Add<Builder> for &'a Builder {
    type Output = Builder;

    fn add(self, other: Builder) -> Builder {
        add(&[self, &other])
    }
}

impl<'a, 'b> Add<&'b Builder> for &'a Builder {
    type Output = Builder;

    fn add(self, other: &'b Builder) -> Builder {
        add(&[self, other])
    }
}

impl Mul<float> for Builder {
    type Output = Builder;

    fn mul(mut self, other: float) -> Builder {
        for (_, _, val) in &mut self.coords {
            *val *= other;
        }
        self
    }
}

impl<'a> Mul<float> for &'a Builder {
    type Output = Builder;

    fn mul(self, other: float) -> Builder {
        self.clone() * other
    }
}

impl Neg for Builder {
    type Output = Builder;

    fn neg(self) -> Builder {
        self * -1.0
    }
}

impl<'a> Neg for &'a Builder {
    type Output = Builder;

    fn neg(self) -> Builder {
        -self.clone()
    }
}

pub fn zeros(nrows: usize, ncols: usize) -> Builder {
    Builder::with_capacity(nrows, ncols, 0)
}

pub fn eye(n: usize) -> Builder {
    let mut builder = Builder::with_capacity(n, n, n);
    builder.coords.extend((0..n).map(|i| (i, i, 1.0)));
    builder
}

/// A dense block. Zero entries are dropped.
pub fn block<M: Dim, N: Dim, S: Storage<float, M, N>>(block: &Matrix<float, M, N, S>) -> Builder {
    let (nrows, ncols) = block.shape();
    let mut builder = Builder::with_capacity(nrows, ncols, nrows * ncols);
    builder.coords.extend(
        (0..ncols)
            .flat_map(|c| (0..nrows).map(move |r| (r, c, block[(r, c)])))
            .filter(|&(_, _, v)| v != 0.0),
    );
    builder
}

/// A block whose values are set after the matrix is built. Entries marked `true` in
/// `sparsity` are stored even while zero.
pub fn block_mut<M: Dim, N: Dim, S: Storage<bool, M, N>>(
    sparsity: &Matrix<bool, M, N, S>,
) -> (Builder, BlockRef<M, N>) {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    let (nrows, ncols) = sparsity.shape();
    let pattern = DMatrix::from_fn(nrows, ncols, |r, c| sparsity[(r, c)]);
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);

    let mut builder = Builder::with_capacity(nrows, ncols, nrows * ncols);
    builder.coords.extend(
        (0..ncols)
            .flat_map(|c| (0..nrows).map(move |r| (r, c)))
            .filter(|&(r, c)| pattern[(r, c)])
            .map(|(r, c)| (r, c, 0.0)),
    );
    builder.placements.push(Placement {
        id,
        row: 0,
        col: 0,
        pattern,
    });

    (
        builder,
        BlockRef {
            id,
            nrows,
            ncols,
            phantom: PhantomData,
        },
    )
}

pub fn add<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let blocks = as_refs(blocks);
    let (nrows, ncols) = blocks.first().map_or((0, 0), |b| b.shape());
    let mut acc = Builder::for_blocks(&blocks);
    for b in &blocks {
        assert_eq!(
            (nrows, ncols),
            b.shape(),
            "matrices being added must have the same shape"
        );
        acc.place(b, 0, 0);
    }
    acc.nrows = nrows;
    acc.ncols = ncols;
    acc
}

pub fn hstack<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let blocks = as_refs(blocks);
    let nrows = blocks.first().map_or(0, |b| b.nrows);
    let mut acc = Builder::for_blocks(&blocks);
    for b in &blocks {
        assert_eq!(
            nrows, b.nrows,
            "hstack requires matrices to have the same number of rows"
        );
        let col = acc.ncols;
        acc.place(b, 0, col);
        acc.ncols += b.ncols;
    }
    acc.nrows = nrows;
    acc
}

pub fn vstack<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let blocks = as_refs(blocks);
    let ncols = blocks.first().map_or(0, |b| b.ncols);
    let mut acc = Builder::for_blocks(&blocks);
    for b in &blocks {
        assert_eq!(
            ncols, b.ncols,
            "vstack requires matrices to have the same number of columns"
        );
        let row = acc.nrows;
        acc.place(b, row, 0);
        acc.nrows += b.nrows;
    }
    acc.ncols = ncols;
    acc
}

pub fn block_diag<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let blocks = as_refs(blocks);
    let mut acc = Builder::for_blocks(&blocks);
    for b in &blocks {
        let (row, col) = acc.shape();
        acc.place(b, row, col);
        acc.nrows += b.nrows;
        acc.ncols += b.ncols;
    }
    acc
}

/// `kron(I_n, block)`: `n` copies of `block` along the diagonal.
pub fn kron_eye<B: AsRef<Builder>>(n: usize, block: B) -> Builder {
    block_diag(&vec![block.as_ref(); n])
}

/// Block matrix from a rectangular grid. Every block row and column needs at least one
/// present block to fix its size.
pub fn bmat<B: AsRef<Builder>>(blocks: &[&[Option<B>]]) -> Builder {
    if blocks.is_empty() {
        return zeros(0, 0);
    }
    let ncols = blocks[0].len();
    assert!(
        blocks.iter().all(|row| row.len() == ncols),
        "bmat must be given a rectangular layout"
    );

    let mut heights: Vec<Option<usize>> = vec![None; blocks.len()];
    let mut widths: Vec<Option<usize>> = vec![None; ncols];
    for (i, row) in blocks.iter().enumerate() {
        for (j, b) in row.iter().enumerate() {
            if let Some(b) = b {
                let (nrows, ncols) = b.as_ref().shape();
                let height = *heights[i].get_or_insert(nrows);
                assert_eq!(height, nrows, "bmat blocks in a row must have the same height");
                let width = *widths[j].get_or_insert(ncols);
                assert_eq!(width, ncols, "bmat blocks in a column must have the same width");
            }
        }
    }
    let row_offsets = offsets(&heights, "row");
    let col_offsets = offsets(&widths, "column");

    let present: Vec<&Builder> = blocks
        .iter()
        .flat_map(|row| row.iter().flatten())
        .map(|b| b.as_ref())
        .collect();
    let mut acc = Builder::for_blocks(&present);
    for (row, &r) in blocks.iter().zip(&row_offsets) {
        for (b, &c) in row.iter().zip(&col_offsets) {
            if let Some(b) = b {
                acc.place(b.as_ref(), r, c);
            }
        }
    }
    acc.nrows = row_offsets[blocks.len()];
    acc.ncols = col_offsets[ncols];
    acc
}

/// Running sum of block sizes, starting at zero.
fn offsets(sizes: &[Option<usize>], name: &str) -> Vec<usize> {
    let mut total = 0;
    let mut offsets = Vec::with_capacity(sizes.len() + 1);
    offsets.push(total);
    for size in sizes {
        total += size.unwrap_or_else(|| panic!("bmat requires every {} to have a known size", name));
        offsets.push(total);
    }
    offsets
}

fn as_refs<B: AsRef<Builder>>(blocks: &[B]) -> Vec<&Builder> {
    blocks.iter().map(|b| b.as_ref()).collect()
}

/// A placement of a tracked block in a built matrix: its top-left corner and the data index
/// of each entry (`None` where the sparsity pattern is empty).
#[derive(Clone, Debug)]
struct TrackedBlock {
    id: usize,
    row: usize,
    col: usize,
    slots: DMatrix<Option<usize>>,
}

#[derive(Clone, Debug)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<float>,
    tracked: Vec<TrackedBlock>,
}

impl CscMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[float] {
        &self.data
    }

    /// Returns the stored value at `(row, col)`, or `None` if the cell is outside the
    /// sparsity pattern.
    pub fn get(&self, row: usize, col: usize) -> Option<float> {
        let start = self.indptr[col];
        let end = self.indptr[col + 1];
        self.indices[start..end]
            .binary_search(&row)
            .ok()
            .map(|i| self.data[start + i])
    }

    /// Returns the `(row, column)` of the entry stored at `index` in the data array.
    pub fn coordinates_of(&self, index: usize) -> (usize, usize) {
        assert!(index < self.data.len(), "data index out of bounds");
        // indptr is non-decreasing so the owning column is the last start <= index
        let col = self.indptr.partition_point(|&start| start <= index) - 1;
        (self.indices[index], col)
    }

    /// Every stored entry of every placement of `block`, as `(row, col, data index)`.
    /// Entries of one placement are column-major.
    pub fn block_entries<M, N>(&self, block: &BlockRef<M, N>) -> Vec<(usize, usize, usize)> {
        let mut entries = Vec::new();
        for t in self.placements(block.id) {
            let (nrows, ncols) = t.slots.shape();
            for c in 0..ncols {
                for r in 0..nrows {
                    if let Some(i) = t.slots[(r, c)] {
                        entries.push((t.row + r, t.col + c, i));
                    }
                }
            }
        }
        entries
    }

    /// Overwrites every placement of `block` with `value`. Cells outside the block's
    /// sparsity pattern must be zero.
    pub fn set_block<M: Dim, N: Dim, S: Storage<float, M, N>>(
        &mut self,
        block: &BlockRef<M, N>,
        value: &Matrix<float, M, N, S>,
    ) {
        assert_eq!(block.shape(), value.shape(), "value does not match block shape");

        let (start, end) = self.placement_range(block.id);
        for t in &self.tracked[start..end] {
            for (slot, &val) in t.slots.iter().zip(value.iter()) {
                match *slot {
                    Some(i) => self.data[i] = val,
                    None => assert_eq!(
                        0.0, val,
                        "unexpected non-zero element in sparse tracked block"
                    ),
                }
            }
        }
    }

    fn placements(&self, block_id: usize) -> &[TrackedBlock] {
        let (start, end) = self.placement_range(block_id);
        &self.tracked[start..end]
    }

    fn placement_range(&self, block_id: usize) -> (usize, usize) {
        // tracked is sorted by id so all placements of a block are adjacent
        let start = self.tracked.partition_point(|t| t.id < block_id);
        let end = self.tracked.partition_point(|t| t.id <= block_id);
        assert!(start < end, "Block not in this matrix");
        (start, end)
    }

    pub fn to_dense(&self) -> DMatrix<float> {
        let mut mat = DMatrix::zeros(self.nrows, self.ncols);
        for c in 0..self.ncols {
            for i in self.indptr[c]..self.indptr[c + 1] {
                mat[(self.indices[i], c)] = self.data[i];
            }
        }
        mat
    }
}

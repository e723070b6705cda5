//! Multiply-accumulate kernels.
//!
//! Every kernel is expressed over device buffers of `AtomicI64`: A and B are
//! only ever loaded, C is only ever updated. A task (x, y) contributes
//! `A[x*n + y] * B[y]` to `C[x]`, with x the output index and y the
//! contraction index. All arithmetic wraps.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::partition::Dim2;

/// Which kernel a launch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    /// One task per (x, y) pair, atomic fetch-add into `C[x]`.
    Parallel,
    /// One task walking the whole domain in row order.
    Sequential,
    /// Same tiling as `Parallel` but with a split load/store update.
    /// Loses updates under contention; kept only as a negative control.
    Unsynchronized,
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelVariant::Parallel => write!(f, "parallel"),
            KernelVariant::Sequential => write!(f, "sequential"),
            KernelVariant::Unsynchronized => write!(f, "unsynchronized"),
        }
    }
}

/// Signature shared by the per-task bodies: `(x, y, n, A, B, C) -> in_bounds`.
pub type TaskBody = fn(usize, usize, usize, &[AtomicI64], &[AtomicI64], &[AtomicI64]) -> bool;

/// Global task coordinate of `thread_idx` inside block `block_idx`.
#[inline]
pub fn global_coords(block_idx: Dim2, block_dim: Dim2, thread_idx: Dim2) -> Dim2 {
    Dim2::new(
        block_idx.x * block_dim.x + thread_idx.x,
        block_idx.y * block_dim.y + thread_idx.y,
    )
}

#[inline]
fn product(x: usize, y: usize, n: usize, a: &[AtomicI64], b: &[AtomicI64]) -> i64 {
    a[x * n + y]
        .load(Ordering::Relaxed)
        .wrapping_mul(b[y].load(Ordering::Relaxed))
}

/// Parallel task body. Returns whether the task was in bounds.
#[inline]
pub fn accumulate(
    x: usize,
    y: usize,
    n: usize,
    a: &[AtomicI64],
    b: &[AtomicI64],
    c: &[AtomicI64],
) -> bool {
    if x >= n || y >= n {
        return false;
    }
    c[x].fetch_add(product(x, y, n, a, b), Ordering::Relaxed);
    true
}

/// Task body with a non-atomic read-modify-write on `C[x]`.
///
/// Each load and store is individually atomic, so this is free of undefined
/// behaviour, but two tasks on the same x can both load the old value and one
/// of the additions is lost.
#[inline]
pub fn accumulate_unsynchronized(
    x: usize,
    y: usize,
    n: usize,
    a: &[AtomicI64],
    b: &[AtomicI64],
    c: &[AtomicI64],
) -> bool {
    accumulate_split(x, y, n, a, b, c, || {})
}

/// `accumulate_unsynchronized` with `between` run after the load of `C[x]`
/// and before the store.
#[inline]
fn accumulate_split<F: FnOnce()>(
    x: usize,
    y: usize,
    n: usize,
    a: &[AtomicI64],
    b: &[AtomicI64],
    c: &[AtomicI64],
    between: F,
) -> bool {
    if x >= n || y >= n {
        return false;
    }
    let old = c[x].load(Ordering::Relaxed);
    between();
    c[x].store(old.wrapping_add(product(x, y, n, a, b)), Ordering::Relaxed);
    true
}

/// Run every task of one block with `body`. Returns the number of in-bounds
/// tasks that did work.
pub fn run_block<F>(
    block_idx: Dim2,
    block_dim: Dim2,
    n: usize,
    a: &[AtomicI64],
    b: &[AtomicI64],
    c: &[AtomicI64],
    body: F,
) -> usize
where
    F: Fn(usize, usize, usize, &[AtomicI64], &[AtomicI64], &[AtomicI64]) -> bool,
{
    let mut done = 0;
    for tx in 0..block_dim.x {
        for ty in 0..block_dim.y {
            let g = global_coords(block_idx, block_dim, Dim2::new(tx, ty));
            if body(g.x, g.y, n, a, b, c) {
                done += 1;
            }
        }
    }
    done
}

/// Sequential reference: outer i is the output index, inner j the
/// contraction index, `C[i] += A[i*n + j] * B[j]`. Single task, so the plain
/// read-modify-write is exact.
pub fn sequential(n: usize, a: &[AtomicI64], b: &[AtomicI64], c: &[AtomicI64]) -> usize {
    let mut done = 0;
    for i in 0..n {
        for j in 0..n {
            accumulate_unsynchronized(i, j, n, a, b, c);
            done += 1;
        }
    }
    done
}

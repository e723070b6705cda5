use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{MatVecError, Result};

/// A square, row-major integer matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    n: usize,
    data: Vec<i64>,
}

impl Matrix {
    /// Create a matrix from row-major data.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `data.len() != n * n`.
    pub fn new(n: usize, data: Vec<i64>) -> Result<Self> {
        let expected = checked_square(n)?;
        if data.len() != expected {
            return Err(MatVecError::InvalidArgument(format!(
                "matrix data has {} elements but {}x{} needs {}",
                data.len(),
                n,
                n,
                expected
            )));
        }
        Ok(Matrix { n, data })
    }

    /// Build an `n`x`n` matrix where element (row, col) is `f(row, col)`.
    pub fn from_fn<F>(n: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> i64,
    {
        let mut data = host_buffer("A", checked_square(n)?)?;
        for row in 0..n {
            for col in 0..n {
                data.push(f(row, col));
            }
        }
        Ok(Matrix { n, data })
    }

    /// Build a matrix from a list of equally sized rows.
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(MatVecError::InvalidArgument(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                n
            )));
        }
        Ok(Matrix {
            n,
            data: rows.concat(),
        })
    }

    /// Reference construction: every row holds `1..=n`.
    pub fn reference(n: usize) -> Result<Self> {
        Self::from_fn(n, |_, col| col as i64 + 1)
    }

    /// Matrix with uniformly distributed entries in `-range..=range`.
    pub fn random(n: usize, range: u32, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let range = i64::from(range);
        Self::from_fn(n, |_, _| rng.gen_range(-range..=range))
    }

    /// Edge length.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Element at (row, col).
    ///
    /// # Panics
    /// Panics if either index is out of range.
    pub fn get(&self, row: usize, col: usize) -> i64 {
        assert!(row < self.n && col < self.n, "index ({row}, {col}) out of range");
        self.data[row * self.n + col]
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.data
    }
}

/// A dense integer vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vector {
    data: Vec<i64>,
}

impl Vector {
    pub fn new(data: Vec<i64>) -> Self {
        Vector { data }
    }

    /// Reference construction: `[1, 2, ..., n]`.
    pub fn reference(n: usize) -> Result<Self> {
        let mut data = host_buffer("B", n)?;
        data.extend(1..=n as i64);
        Ok(Vector { data })
    }

    /// Vector with uniformly distributed entries in `-range..=range`.
    pub fn random(n: usize, range: u32, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let range = i64::from(range);
        let mut data = host_buffer("B", n)?;
        data.extend((0..n).map(|_| rng.gen_range(-range..=range)));
        Ok(Vector { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<i64> {
        self.data
    }
}

impl From<Vec<i64>> for Vector {
    fn from(data: Vec<i64>) -> Self {
        Vector::new(data)
    }
}

/// The read-only inputs of one product: A (n x n) and B (n).
#[derive(Debug, Clone)]
pub struct Operands {
    a: Matrix,
    b: Vector,
}

impl Operands {
    /// Pair a matrix with a vector.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `b.len()` differs from the matrix edge.
    pub fn new(a: Matrix, b: Vector) -> Result<Self> {
        if a.dim() != b.len() {
            return Err(MatVecError::InvalidArgument(format!(
                "matrix is {}x{} but vector has {} elements",
                a.dim(),
                a.dim(),
                b.len()
            )));
        }
        Ok(Operands { a, b })
    }

    /// Reference inputs: `A[i][j] = j + 1`, `B[j] = j + 1`.
    pub fn reference(n: usize) -> Result<Self> {
        Self::new(Matrix::reference(n)?, Vector::reference(n)?)
    }

    /// Seeded random inputs with entries in `-range..=range`.
    pub fn random(n: usize, range: u32, seed: u64) -> Result<Self> {
        Self::new(
            Matrix::random(n, range, seed)?,
            Vector::random(n, range, seed.wrapping_add(1))?,
        )
    }

    pub fn dim(&self) -> usize {
        self.a.dim()
    }

    pub fn matrix(&self) -> &Matrix {
        &self.a
    }

    pub fn vector(&self) -> &Vector {
        &self.b
    }

    /// `C[i] = sum_j A[i][j] * B[j]` computed directly, with the same
    /// wrapping arithmetic the kernels use.
    pub fn expected(&self) -> Vec<i64> {
        let n = self.dim();
        let (a, b) = (self.a.as_slice(), self.b.as_slice());
        (0..n)
            .map(|i| {
                a[i * n..(i + 1) * n]
                    .iter()
                    .zip(b)
                    .fold(0i64, |acc, (&x, &y)| acc.wrapping_add(x.wrapping_mul(y)))
            })
            .collect()
    }
}

/// Empty host vector with room for `len` elements, or `AllocationFailure`
/// if the request exceeds `isize::MAX` bytes or the allocator refuses it.
fn host_buffer(label: &'static str, len: usize) -> Result<Vec<i64>> {
    let fail = |bytes: usize, reason: String| MatVecError::AllocationFailure {
        buffer: label,
        bytes,
        reason,
    };
    let bytes = len
        .checked_mul(std::mem::size_of::<i64>())
        .filter(|&b| b <= isize::MAX as usize)
        .ok_or_else(|| {
            fail(
                len.saturating_mul(std::mem::size_of::<i64>()),
                format!("{} host elements exceed the address space", len),
            )
        })?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|e| fail(bytes, format!("host: {e}")))?;
    Ok(data)
}

fn checked_square(n: usize) -> Result<usize> {
    n.checked_mul(n).ok_or_else(|| {
        MatVecError::InvalidArgument(format!("dimension {} overflows an {}x{} matrix", n, n, n))
    })
}

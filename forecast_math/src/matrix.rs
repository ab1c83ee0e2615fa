//! Small dense square matrices
//!
//! State-space models here have at most a few dozen states, so a plain
//! row-major `Vec<f64>` is all that is needed.

use crate::{MathError, Result};
use std::ops::{Index, IndexMut};

/// Row-major square matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create an `n x n` zero matrix
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Create an `n x n` identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Outer product `v v'`
    pub fn outer(v: &[f64]) -> Self {
        let n = v.len();
        let mut m = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                m[(i, j)] = v[i] * v[j];
            }
        }
        m
    }

    /// Dimension
    pub fn size(&self) -> usize {
        self.n
    }

    /// Row `i` as a slice
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Matrix product `self * other`
    pub fn product(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_size(other)?;
        let n = self.n;
        let mut out = Matrix::zeros(n);
        for i in 0..n {
            for k in 0..n {
                let a = self[(i, k)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..n {
                    out.data[i * n + j] += a * other.data[k * n + j];
                }
            }
        }
        Ok(out)
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.n {
            return Err(MathError::InvalidInput(format!(
                "Vector of length {} does not match {}x{} matrix",
                v.len(),
                self.n,
                self.n
            )));
        }
        Ok((0..self.n)
            .map(|i| self.row(i).iter().zip(v.iter()).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Transpose
    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.n);
        for i in 0..self.n {
            for j in 0..self.n {
                out[(j, i)] = self[(i, j)];
            }
        }
        out
    }

    /// Element-wise sum
    pub fn plus(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_size(other)?;
        Ok(Matrix {
            n: self.n,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    /// `self * inner * self'`
    pub fn sandwich(&self, inner: &Matrix) -> Result<Matrix> {
        self.product(inner)?.product(&self.transpose())
    }

    /// Largest absolute entry
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
    }

    /// Whether every entry is finite
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    fn check_same_size(&self, other: &Matrix) -> Result<()> {
        if self.n != other.n {
            return Err(MathError::InvalidInput(format!(
                "Matrix sizes differ: {} vs {}",
                self.n, other.n
            )));
        }
        Ok(())
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.n + j]
    }
}

/// Solve the discrete Lyapunov equation `P = A P A' + Q` by doubling.
///
/// Iterates `P_{k+1} = P_k + A_k P_k A_k'`, `A_{k+1} = A_k^2`, which
/// converges quadratically when the spectral radius of `A` is below one.
/// Fails when the iteration does not settle within `max_doublings` steps,
/// which is how a non-stable `A` shows up.
pub fn solve_discrete_lyapunov(a: &Matrix, q: &Matrix, max_doublings: usize) -> Result<Matrix> {
    let mut p = q.clone();
    let mut a_k = a.clone();

    for _ in 0..max_doublings {
        let update = a_k.sandwich(&p)?;
        p = p.plus(&update)?;
        if !p.is_finite() {
            return Err(MathError::CalculationError(
                "Lyapunov iteration produced non-finite values".to_string(),
            ));
        }
        if update.max_abs() <= 1e-12 * p.max_abs().max(1.0) {
            return Ok(p);
        }
        a_k = a_k.product(&a_k)?;
    }

    Err(MathError::CalculationError(format!(
        "Lyapunov iteration did not converge in {} doublings",
        max_doublings
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_product() {
        let mut m = Matrix::zeros(2);
        m[(0, 0)] = 1.0;
        m[(0, 1)] = 2.0;
        m[(1, 0)] = 3.0;
        m[(1, 1)] = 4.0;

        assert_eq!(m.product(&Matrix::identity(2)).unwrap(), m);
        assert_eq!(m.transpose()[(0, 1)], 3.0);
        assert_eq!(m.mul_vec(&[1.0, 1.0]).unwrap(), vec![3.0, 7.0]);
    }

    #[test]
    fn test_lyapunov_scalar() {
        // p = a^2 p + q  =>  p = q / (1 - a^2)
        let mut a = Matrix::zeros(1);
        a[(0, 0)] = 0.8;
        let q = Matrix::identity(1);

        let p = solve_discrete_lyapunov(&a, &q, 64).unwrap();
        assert_abs_diff_eq!(p[(0, 0)], 1.0 / (1.0 - 0.64), epsilon = 1e-9);
    }

    #[test]
    fn test_lyapunov_fixed_point() {
        let mut a = Matrix::zeros(2);
        a[(0, 0)] = 0.5;
        a[(0, 1)] = 1.0;
        a[(1, 0)] = -0.3;
        let q = Matrix::outer(&[1.0, 0.4]);

        let p = solve_discrete_lyapunov(&a, &q, 64).unwrap();
        let rhs = a.sandwich(&p).unwrap().plus(&q).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(p[(i, j)], rhs[(i, j)], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_lyapunov_unstable() {
        let mut a = Matrix::zeros(1);
        a[(0, 0)] = 1.5;
        assert!(solve_discrete_lyapunov(&a, &Matrix::identity(1), 64).is_err());
    }
}

//! Thomas algorithm for the implicit transport step.
//!
//! The system matrix is fixed for a run, so the forward sweep is done once in [`Tridiagonal::factor`]
//! and every time step only pays for the substitution passes.
use crate::errors::BasinError;

/// Tridiagonal matrix stored by diagonals.
///
/// - `lower[i]` multiplies `x[i - 1]` in row `i` (`lower[0]` unused)
/// - `diag[i]` multiplies `x[i]`
/// - `upper[i]` multiplies `x[i + 1]` in row `i` (`upper[n - 1]` unused)
#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal {
    /// Sub-diagonal.
    pub lower: Vec<f64>,
    /// Main diagonal.
    pub diag: Vec<f64>,
    /// Super-diagonal.
    pub upper: Vec<f64>,
}

/// Forward-sweep factors of a [`Tridiagonal`] system.
#[derive(Debug, Clone, PartialEq)]
pub struct Factored {
    lower: Vec<f64>,
    pivot: Vec<f64>,
    upper: Vec<f64>,
}

impl Tridiagonal {
    /// Identity matrix of size `n`.
    pub fn identity(n: usize) -> Self {
        Tridiagonal {
            lower: vec![0.0; n],
            diag: vec![1.0; n],
            upper: vec![0.0; n],
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.diag.len()
    }

    /// True for an empty system.
    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    /// Product `A·x`, used to check solutions.
    pub fn mul(&self, x: &[f64]) -> Vec<f64> {
        let n = self.len();
        (0..n)
            .map(|i| {
                let mut val = self.diag[i] * x[i];
                if i > 0 {
                    val += self.lower[i] * x[i - 1];
                }
                if i + 1 < n {
                    val += self.upper[i] * x[i + 1];
                }
                val
            })
            .collect()
    }

    /// Eliminate the sub-diagonal once.  Fails with [`BasinError::Singular`] if a pivot vanishes
    /// or stops being finite.
    pub fn factor(&self) -> Result<Factored, BasinError> {
        let n = self.len();
        if n == 0 || self.lower.len() != n || self.upper.len() != n {
            return Err(BasinError::Config(
                "tridiagonal diagonals must share a non-zero length".to_string(),
            ));
        }
        let mut pivot = vec![0.0; n];
        let mut ratio = vec![0.0; n];
        for i in 0..n {
            let den = if i == 0 {
                self.diag[0]
            } else {
                self.diag[i] - self.lower[i] * ratio[i - 1]
            };
            let scale = self.diag[i].abs() + self.lower[i].abs() + self.upper[i].abs();
            if !den.is_finite() || den.abs() <= f64::EPSILON * scale {
                return Err(BasinError::Singular { row: i });
            }
            pivot[i] = den;
            ratio[i] = self.upper[i] / den;
        }
        Ok(Factored {
            lower: self.lower.clone(),
            pivot,
            upper: ratio,
        })
    }
}

impl Factored {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.pivot.len()
    }

    /// True for an empty system.
    pub fn is_empty(&self) -> bool {
        self.pivot.is_empty()
    }

    /// Solve `A·x = d`, writing `x` into `out`.  Both slices must match the system size.
    pub fn solve_into(&self, d: &[f64], out: &mut [f64]) {
        let n = self.len();
        assert_eq!(d.len(), n);
        assert_eq!(out.len(), n);
        out[0] = d[0] / self.pivot[0];
        for i in 1..n {
            out[i] = (d[i] - self.lower[i] * out[i - 1]) / self.pivot[i];
        }
        for i in (0..n - 1).rev() {
            out[i] -= self.upper[i] * out[i + 1];
        }
    }

    /// Allocating variant of [`solve_into`](#method.solve_into).
    pub fn solve(&self, d: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.len()];
        self.solve_into(d, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_returns_rhs() {
        let sys = Tridiagonal::identity(5);
        let d = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let x = sys.factor().unwrap().solve(&d);
        assert_eq!(x, d);
    }

    #[test]
    fn laplacian_round_trip() {
        let sys = Tridiagonal {
            lower: vec![0.0, -1.0, -1.0, -1.0],
            diag: vec![2.0, 2.0, 2.0, 2.0],
            upper: vec![-1.0, -1.0, -1.0, 0.0],
        };
        let d = vec![1.0, 0.0, 0.0, 1.0];
        let x = sys.factor().unwrap().solve(&d);
        for (ax, di) in sys.mul(&x).iter().zip(&d) {
            assert!((ax - di).abs() < 1e-12, "Ax = {}, d = {}", ax, di);
        }
        for xi in x {
            assert!((xi - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn factor_reused_across_rhs() {
        let n = 12;
        let alpha = 0.4;
        let sys = Tridiagonal {
            lower: (0..n).map(|i| if i > 0 { -alpha } else { 0.0 }).collect(),
            diag: vec![1.0 + 2.0 * alpha; n],
            upper: (0..n).map(|i| if i < n - 1 { -alpha } else { 0.0 }).collect(),
        };
        let lu = sys.factor().unwrap();
        for k in 0..3 {
            let d: Vec<f64> = (0..n).map(|i| ((i + k) as f64).cos()).collect();
            let x = lu.solve(&d);
            for (ax, di) in sys.mul(&x).iter().zip(&d) {
                assert!((ax - di).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn zero_pivot_is_singular() {
        let sys = Tridiagonal {
            lower: vec![0.0, 1.0, 0.0],
            diag: vec![1.0, 1.0, 1.0],
            upper: vec![1.0, 0.0, 0.0],
        };
        assert_eq!(sys.factor(), Err(BasinError::Singular { row: 1 }));
    }

    #[test]
    fn nan_entry_is_singular() {
        let mut sys = Tridiagonal::identity(4);
        sys.diag[2] = f64::NAN;
        assert_eq!(sys.factor(), Err(BasinError::Singular { row: 2 }));
    }
}
